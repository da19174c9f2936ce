// 🏛️ Institution - root of every other record
//
// Deleting an institution removes its audits and everything below them.

use serde::{Deserialize, Serialize};

use super::coded_enum;

coded_enum! {
    /// Kind of municipal body being audited
    pub enum InstitutionType {
        CityHall => ("Prefeitura", "City Hall"),
        CityCouncil => ("Câmara Municipal", "City Council"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    /// Opaque ID; empty until first saved
    #[serde(default)]
    pub id: String,

    pub municipality_name: String,

    #[serde(rename = "type")]
    pub institution_type: InstitutionType,

    /// Tax registration number (CNPJ)
    pub cnpj: String,
}

impl Institution {
    pub fn new(municipality_name: &str, institution_type: InstitutionType, cnpj: &str) -> Self {
        Institution {
            id: String::new(),
            municipality_name: municipality_name.to_string(),
            institution_type,
            cnpj: cnpj.to_string(),
        }
    }

    /// "Audiville - City Hall"
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.municipality_name, self.institution_type.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_institution_type_parsing() {
        assert_eq!("Prefeitura".parse::<InstitutionType>().unwrap(), InstitutionType::CityHall);
        assert_eq!("city-council".parse::<InstitutionType>().unwrap(), InstitutionType::CityCouncil);
        assert!("county".parse::<InstitutionType>().is_err());
    }

    #[test]
    fn test_serializes_entity_shape() {
        let mut inst = Institution::new("Audiville", InstitutionType::CityCouncil, "98.765.432/0001-11");
        inst.id = "inst-1".to_string();

        let json = serde_json::to_value(&inst).unwrap();
        assert_eq!(json["municipalityName"], "Audiville");
        assert_eq!(json["type"], "Câmara Municipal");
        assert_eq!(json["cnpj"], "98.765.432/0001-11");
        assert_eq!(inst.display_name(), "Audiville - City Council");
    }
}
