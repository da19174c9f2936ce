// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;
mod cli;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;

use cli::*;
use gestaudit::*;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.quiet, cli.verbose) {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        eprintln!("❌ {:#}", e);
        if let Some(AuditError::NotConfirmed { .. }) = e.downcast_ref::<AuditError>() {
            eprintln!("   Re-run with --yes to confirm.");
        }
        std::process::exit(1);
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("GESTAUDIT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    let mut store = AuditStore::open(&config.database.path)?;

    match cli.command {
        Commands::Init => {
            println!("✓ Database ready at {}", config.database.path.display());
        }
        Commands::Seed => {
            if store.seed_if_empty()? {
                let data = store.data();
                println!(
                    "✓ Demo data loaded: {} institutions, {} audits, {} findings",
                    data.institutions.len(),
                    data.audits.len(),
                    data.findings.len()
                );
            } else {
                println!("✓ Database already has data, nothing to seed");
            }
        }
        Commands::Institution(cmd) => run_institution(&mut store, cmd)?,
        Commands::Audit(cmd) => run_audit(&mut store, cmd)?,
        Commands::Finding(cmd) => run_finding(&mut store, cmd)?,
        Commands::Recommendation(cmd) => run_recommendation(&mut store, cmd)?,
        Commands::Stage(cmd) => run_stage(&mut store, cmd)?,
        Commands::Risk(cmd) => run_risk(&mut store, cmd)?,
        Commands::Section(cmd) => run_section(&mut store, cmd)?,
        Commands::Profile(cmd) => run_profile(&mut store, cmd)?,
        Commands::Report(args) => run_report(&store, args)?,
        Commands::Dashboard(args) => {
            let data = match &args.institution {
                Some(id) => {
                    store.select_institution(id)?;
                    store.data().scoped_to_institution(id)
                }
                None => store.data().clone(),
            };
            let today = args.today.unwrap_or_else(|| Local::now().date_naive());
            let stats = DashboardStats::compute(
                &data,
                today,
                config.dashboard.deadline_window_days,
                config.dashboard.list_limit,
            );
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", stats.render_text());
            }
        }
        Commands::Export(cmd) => run_export(&store, cmd)?,
        Commands::Import(args) => {
            let backup = read_backup(&args.file)?;
            store.import(&backup, args.yes)?;
            println!(
                "✓ Imported {} institutions, {} audits, {} risks",
                store.data().institutions.len(),
                store.data().audits.len(),
                store.data().risks.len()
            );
        }
        Commands::Ui => run_ui_mode(store, &config)?,
    }

    Ok(())
}

fn delete(store: &mut AuditStore, target: RecordRef, yes: bool) -> Result<()> {
    let impact = store.delete(&target, yes)?;
    println!("✓ Deleted {} {}", target.entity_name(), target.id());
    if !impact.is_empty() {
        println!("  (also removed {})", impact.describe().trim_start_matches("will also delete "));
    }
    Ok(())
}

/// Empty string clears an optional text field.
fn set_text(field: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *field = if v.is_empty() { None } else { Some(v) };
    }
}

fn found<'a, T>(item: Option<&'a T>, entity: &'static str, id: &str) -> Result<&'a T> {
    item.ok_or_else(|| {
        AuditError::NotFound {
            entity,
            id: id.to_string(),
        }
        .into()
    })
}

// ============================================================================
// ENTITY COMMANDS
// ============================================================================

fn run_institution(store: &mut AuditStore, cmd: InstitutionCommands) -> Result<()> {
    match cmd {
        InstitutionCommands::Add(args) => {
            let saved = store.save_institution(Institution::new(&args.name, args.institution_type, &args.cnpj))?;
            println!("✓ Institution created: {} ({})", saved.display_name(), saved.id);
        }
        InstitutionCommands::List => {
            for i in &store.data().institutions {
                println!("{:<44} {:<34} {}", i.id, i.display_name(), i.cnpj);
            }
        }
        InstitutionCommands::Delete(args) => delete(store, RecordRef::Institution(args.id), args.yes)?,
    }
    Ok(())
}

fn run_audit(store: &mut AuditStore, cmd: AuditCommands) -> Result<()> {
    match cmd {
        AuditCommands::Add(args) => {
            let mut audit = Audit::new(
                &args.institution,
                args.year,
                &args.number,
                &args.title,
                &args.sector,
                &args.responsible,
                args.audit_type,
                args.start,
                args.end,
                args.priority,
            );
            set_text(&mut audit.objective, args.text.objective);
            set_text(&mut audit.scope, args.text.scope);
            set_text(&mut audit.criteria, args.text.criteria);
            set_text(&mut audit.auditor_notes, args.text.notes);

            let saved = store.save_audit(audit)?;
            println!("✓ Audit created: {} {} ({})", saved.audit_number, saved.title, saved.id);
        }
        AuditCommands::Update(args) => {
            let mut audit = found(store.data().audit(&args.id), "audit", &args.id)?.clone();
            if let Some(v) = args.title {
                audit.title = v;
            }
            if let Some(v) = args.sector {
                audit.audited_sector = v;
            }
            if let Some(v) = args.responsible {
                audit.sector_responsible = v;
            }
            if let Some(v) = args.audit_type {
                audit.audit_type = v;
            }
            if let Some(v) = args.status {
                audit.status = v;
            }
            if let Some(v) = args.priority {
                audit.priority = v;
            }
            if let Some(v) = args.start {
                audit.planned_start_date = v;
            }
            if let Some(v) = args.end {
                audit.planned_end_date = v;
            }
            if args.actual_start.is_some() {
                audit.actual_start_date = args.actual_start;
            }
            if args.actual_end.is_some() {
                audit.actual_end_date = args.actual_end;
            }
            set_text(&mut audit.objective, args.text.objective);
            set_text(&mut audit.scope, args.text.scope);
            set_text(&mut audit.criteria, args.text.criteria);
            set_text(&mut audit.auditor_notes, args.text.notes);

            let saved = store.save_audit(audit)?;
            println!("✓ Audit updated: {} [{}]", saved.audit_number, saved.status);
        }
        AuditCommands::List(args) => {
            let data = store.data();
            for a in data.audits.iter().filter(|a| {
                args.institution.as_deref().map_or(true, |i| a.institution_id == i)
                    && args.year.map_or(true, |y| a.year == y)
            }) {
                println!(
                    "{:<40} {:<14} {:<40} {:<16} {}",
                    a.id, a.audit_number, a.title, a.status.label(), a.priority.label()
                );
            }
        }
        AuditCommands::Show { id } => {
            let data = store.data();
            let a = found(data.audit(&id), "audit", &id)?;
            println!("{} - {}", a.audit_number, a.title);
            if let Some(inst) = data.institution(&a.institution_id) {
                println!("  Institution:  {}", inst.display_name());
            }
            println!("  Year:         {}", a.year);
            println!("  Sector:       {} (responsible: {})", a.audited_sector, a.sector_responsible);
            println!("  Type:         {}", a.audit_type);
            println!("  Status:       {}", a.status);
            println!("  Priority:     {}", a.priority);
            println!(
                "  Planned:      {} to {}",
                format_date(a.planned_start_date),
                format_date(a.planned_end_date)
            );
            println!(
                "  Actual:       {} to {}",
                format_opt_date(a.actual_start_date),
                format_opt_date(a.actual_end_date)
            );
            println!(
                "  Records:      {} findings, {} recommendations, {} stages, {} risks, {} sections",
                data.findings_of(&id).len(),
                data.recommendations_for_audit(&id).len(),
                data.stages_of(&id).len(),
                data.risks_of(&id).len(),
                data.sections_of(&id).len()
            );
        }
        AuditCommands::Delete(args) => delete(store, RecordRef::Audit(args.id), args.yes)?,
    }
    Ok(())
}

fn apply_finding_text(finding: &mut Finding, text: FindingTextArgs) {
    if let Some(v) = text.evidence {
        finding.evidence = v;
    }
    if let Some(v) = text.criteria {
        finding.violated_criteria = v;
    }
    if let Some(v) = text.cause {
        finding.cause = v;
    }
    if let Some(v) = text.effect {
        finding.effect = v;
    }
}

fn run_finding(store: &mut AuditStore, cmd: FindingCommands) -> Result<()> {
    match cmd {
        FindingCommands::Add(args) => {
            let mut finding = Finding::new(&args.audit, &args.code, &args.summary, args.classification);
            apply_finding_text(&mut finding, args.text);
            let saved = store.save_finding(finding)?;
            println!("✓ Finding created: {} ({})", saved.finding_code, saved.id);
        }
        FindingCommands::Update(args) => {
            let mut finding = found(store.data().finding(&args.id), "finding", &args.id)?.clone();
            if let Some(v) = args.code {
                finding.finding_code = v;
            }
            if let Some(v) = args.summary {
                finding.summary = v;
            }
            if let Some(v) = args.classification {
                finding.classification = v;
            }
            if let Some(v) = args.status {
                finding.status = v;
            }
            apply_finding_text(&mut finding, args.text);
            let saved = store.save_finding(finding)?;
            println!("✓ Finding updated: {} [{}]", saved.finding_code, saved.status);
        }
        FindingCommands::List { audit } => {
            let data = store.data();
            for f in data.findings_of(&audit) {
                println!(
                    "{:<40} {:<8} {:<8} {:<12} {} rec(s), {} attachment(s)  {}",
                    f.id,
                    f.finding_code,
                    f.classification.label(),
                    f.status.label(),
                    data.recommendations_of(&f.id).len(),
                    f.attachments.len(),
                    f.summary
                );
            }
        }
        FindingCommands::Delete(args) => delete(store, RecordRef::Finding(args.id), args.yes)?,
        FindingCommands::Attach { finding, file } => {
            let mut record = found(store.data().finding(&finding), "finding", &finding)?.clone();
            let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());

            let attachment = Attachment::from_bytes(&name, Attachment::guess_mime(&name), &bytes);
            let attachment_id = attachment.id.clone();
            record.attachments.push(attachment);
            store.save_finding(record)?;
            println!("✓ Attached {} ({} bytes) as {}", name, bytes.len(), attachment_id);
        }
        FindingCommands::Detach { finding, attachment } => {
            let mut record = found(store.data().finding(&finding), "finding", &finding)?.clone();
            if !record.remove_attachment(&attachment) {
                bail!(AuditError::NotFound {
                    entity: "attachment",
                    id: attachment,
                });
            }
            store.save_finding(record)?;
            println!("✓ Attachment {} removed", attachment);
        }
        FindingCommands::Extract { finding, attachment, out } => {
            let record = found(store.data().finding(&finding), "finding", &finding)?;
            let att = found(record.attachment(&attachment), "attachment", &attachment)?;
            let path = att.extract_to(&out)?;
            println!("✓ Extracted {}", path.display());
        }
    }
    Ok(())
}

fn run_recommendation(store: &mut AuditStore, cmd: RecommendationCommands) -> Result<()> {
    match cmd {
        RecommendationCommands::Add(args) => {
            let saved = store.save_recommendation(Recommendation::new(
                &args.finding,
                &args.code,
                &args.description,
                &args.responsible,
                args.deadline,
            ))?;
            println!("✓ Recommendation created: {} ({})", saved.recommendation_code, saved.id);
        }
        RecommendationCommands::Update(args) => {
            let mut rec = found(store.data().recommendation(&args.id), "recommendation", &args.id)?.clone();
            if let Some(v) = args.description {
                rec.description = v;
            }
            if let Some(v) = args.responsible {
                rec.implementation_responsible = v;
            }
            if let Some(v) = args.deadline {
                rec.deadline = v;
            }
            if let Some(v) = args.status {
                rec.status = v;
            }
            if args.verified_on.is_some() {
                rec.verification_date = args.verified_on;
            }
            let saved = store.save_recommendation(rec)?;
            println!("✓ Recommendation updated: {} [{}]", saved.recommendation_code, saved.status);
        }
        RecommendationCommands::List { finding, audit } => {
            let data = store.data();
            let recs = match (finding, audit) {
                (Some(f), _) => data.recommendations_of(&f),
                (None, Some(a)) => data.recommendations_for_audit(&a),
                (None, None) => Vec::new(),
            };
            for r in recs {
                println!(
                    "{:<40} {:<8} {:<14} {:<12} {}  {}",
                    r.id,
                    r.recommendation_code,
                    r.status.label(),
                    format_date(r.deadline),
                    r.implementation_responsible,
                    r.description
                );
            }
        }
        RecommendationCommands::Delete(args) => delete(store, RecordRef::Recommendation(args.id), args.yes)?,
    }
    Ok(())
}

fn run_stage(store: &mut AuditStore, cmd: StageCommands) -> Result<()> {
    match cmd {
        StageCommands::Add(args) => {
            let mut stage = AuditStage::new(&args.audit, &args.name, args.start, args.end);
            stage.responsible = args.responsible;
            let saved = store.save_stage(stage)?;
            println!("✓ Stage created: {} ({} days, {})", saved.name, saved.planned_days(), saved.id);
        }
        StageCommands::Update(args) => {
            let mut stage = found(store.data().stage(&args.id), "audit stage", &args.id)?.clone();
            if let Some(v) = args.name {
                stage.name = v;
            }
            if let Some(v) = args.status {
                stage.status = v;
            }
            if let Some(v) = args.start {
                stage.planned_start_date = v;
            }
            if let Some(v) = args.end {
                stage.planned_end_date = v;
            }
            if args.actual_start.is_some() {
                stage.actual_start_date = args.actual_start;
            }
            if args.actual_end.is_some() {
                stage.actual_end_date = args.actual_end;
            }
            set_text(&mut stage.responsible, args.responsible);
            set_text(&mut stage.notes, args.notes);
            let saved = store.save_stage(stage)?;
            println!("✓ Stage updated: {} [{}]", saved.name, saved.status);
        }
        StageCommands::List { audit } => {
            for s in store.data().stages_of(&audit) {
                println!(
                    "{:<40} {:<20} {} - {}  {:<14} {}",
                    s.id,
                    s.name,
                    format_date(s.planned_start_date),
                    format_date(s.planned_end_date),
                    s.status.label(),
                    s.responsible.as_deref().unwrap_or("")
                );
            }
        }
        StageCommands::Delete(args) => delete(store, RecordRef::Stage(args.id), args.yes)?,
    }
    Ok(())
}

fn run_risk(store: &mut AuditStore, cmd: RiskCommands) -> Result<()> {
    match cmd {
        RiskCommands::Add(args) => {
            let saved = store.save_risk(Risk::new(
                &args.audit,
                &args.description,
                args.impact,
                args.probability,
                &args.controls,
            ))?;
            println!("✓ Risk created: {} [{}] ({})", saved.description, saved.risk_level, saved.id);
        }
        RiskCommands::Update(args) => {
            let mut risk = found(store.data().risk(&args.id), "risk", &args.id)?.clone();
            if let Some(v) = args.description {
                risk.description = v;
            }
            if let Some(v) = args.impact {
                risk.impact = v;
            }
            if let Some(v) = args.probability {
                risk.probability = v;
            }
            if let Some(v) = args.controls {
                risk.controls = v;
            }
            let saved = store.save_risk(risk)?;
            println!("✓ Risk updated: {} [{}]", saved.description, saved.risk_level);
        }
        RiskCommands::List { audit } => {
            for r in store.data().risks_of(&audit) {
                println!(
                    "{:<40} {:<10} {:<14} {:<14} {}",
                    r.id,
                    r.risk_level.label(),
                    r.impact.label(),
                    r.probability.label(),
                    r.description
                );
            }
        }
        RiskCommands::Delete(args) => delete(store, RecordRef::Risk(args.id), args.yes)?,
        RiskCommands::Matrix { audit } => {
            let data = store.data();
            let a = found(data.audit(&audit), "audit", &audit)?;
            println!("Risk matrix - {} {}\n", a.audit_number, a.title);
            print!("{}", RiskMatrixView::build(&data.risks_of(&audit)).render_text());
        }
    }
    Ok(())
}

fn run_section(store: &mut AuditStore, cmd: SectionCommands) -> Result<()> {
    match cmd {
        SectionCommands::Add(args) => {
            let sequence = args.sequence.unwrap_or_else(|| {
                let existing: Vec<CustomReportSection> =
                    store.data().sections_of(&args.audit).into_iter().cloned().collect();
                CustomReportSection::next_sequence(&existing)
            });
            let saved = store.save_section(CustomReportSection::new(&args.audit, &args.title, &args.content, sequence))?;
            println!("✓ Section created: {} at {} ({})", saved.title, saved.sequence, saved.id);
        }
        SectionCommands::Update(args) => {
            let mut section = found(store.data().section(&args.id), "report section", &args.id)?.clone();
            if let Some(v) = args.title {
                section.title = v;
            }
            if let Some(v) = args.content {
                section.content = v;
            }
            if let Some(v) = args.sequence {
                section.sequence = v;
            }
            let saved = store.save_section(section)?;
            println!("✓ Section updated: {} at {}", saved.title, saved.sequence);
        }
        SectionCommands::List { audit } => {
            for s in store.data().sections_of(&audit) {
                let marker = if s.is_attachment() { " (annex)" } else { "" };
                println!("{:<40} {:>6}  {}{}", s.id, s.sequence, s.title, marker);
            }
        }
        SectionCommands::Delete(args) => delete(store, RecordRef::Section(args.id), args.yes)?,
    }
    Ok(())
}

fn run_profile(store: &mut AuditStore, cmd: ProfileCommands) -> Result<()> {
    match cmd {
        ProfileCommands::Show => {
            let p = &store.data().profile;
            if p.is_empty() {
                println!("No auditor profile set.");
            } else {
                println!("Name:      {}", p.name);
                println!("Role:      {}", p.role);
                println!("Email:     {}", p.email);
                println!("Signature: {}", p.signature);
            }
        }
        ProfileCommands::Set { name, role, email, signature } => {
            let mut profile = store.data().profile.clone();
            for (field, value) in [
                (&mut profile.name, name),
                (&mut profile.role, role),
                (&mut profile.email, email),
                (&mut profile.signature, signature),
            ] {
                if let Some(v) = value {
                    *field = v;
                }
            }
            store.save_profile(&profile)?;
            println!("✓ Profile saved");
        }
    }
    Ok(())
}

// ============================================================================
// REPORTS & EXPORT
// ============================================================================

fn run_report(store: &AuditStore, args: ReportArgs) -> Result<()> {
    let data = store.data();
    let (text, json) = match args.kind {
        ReportKind::Audit { id, risk_matrix } => {
            let report = AuditReport::build(data, &id, risk_matrix)?;
            (report.render_text(), serde_json::to_string_pretty(&report)?)
        }
        ReportKind::Annual { year } => {
            let summary = AnnualSummary::compute(data, year);
            (summary.render_text(), serde_json::to_string_pretty(&summary)?)
        }
        ReportKind::Plan { year } => {
            let plan = AnnualPlan::compute(data, year);
            (plan.render_text(), serde_json::to_string_pretty(&plan)?)
        }
        ReportKind::Risks { year } => {
            let summary = RiskSummary::compute(data, year);
            (summary.render_text(), serde_json::to_string_pretty(&summary)?)
        }
    };

    if args.json {
        println!("{}", json);
    } else {
        print!("{}", text);
    }
    Ok(())
}

fn run_export(store: &AuditStore, cmd: ExportCommands) -> Result<()> {
    let data = store.data();
    match cmd {
        ExportCommands::Json { out } => {
            std::fs::write(&out, export_json(data)?).with_context(|| format!("Failed to write {}", out.display()))?;
            println!("✓ Backup written to {}", out.display());
        }
        ExportCommands::Csv(csv) => {
            let (export, dir) = match csv {
                CsvCommands::Audit { id, out } => (audit_csv(data, &id)?, out),
                CsvCommands::Annual { year, out } => (annual_csv(data, year)?, out),
                CsvCommands::Risks { year, out } => (risks_csv(data, year)?, out),
            };
            let path = export.write_to(&dir)?;
            println!("✓ CSV written to {}", path.display());
        }
    }
    Ok(())
}

// ============================================================================
// UI
// ============================================================================

#[cfg(feature = "tui")]
fn run_ui_mode(store: AuditStore, config: &AppConfig) -> Result<()> {
    println!("🖥️  Loading GestAudit UI...\n");
    println!(
        "✓ Loaded {} institutions, {} audits\n",
        store.data().institutions.len(),
        store.data().audits.len()
    );
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(store, config.dashboard.clone());
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: AuditStore, _config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the REST API: cargo run --bin gestaudit-server --features server");
    std::process::exit(1);
}
