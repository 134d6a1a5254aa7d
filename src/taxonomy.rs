//! Domain and skill taxonomies per protocol.
//!
//! The built-in tables below are the curricula used by the monitoring forms.
//! Their order is the order reports present domains and skills in, so it is
//! part of the output contract. A [`TaxonomyRegistry`] is built once at
//! startup (optionally with overrides from the config file) and is read-only
//! afterwards.

use crate::models::{Protocol, Scenario};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

type DomainTable = &'static [(&'static str, &'static str, &'static [&'static str])];

const IMNCI_2_59_MONTHS: DomainTable = &[
    ("danger", "Danger signs", &["Any Danger Sign"]),
    (
        "respiratory",
        "COUGH:",
        &[
            "Severe pneumonia/disease",
            "Pneumonia",
            "Cough/cold",
            "Severe pneumonia/disease (Wheeze)",
            "Pneumonia (Wheeze)",
            "Cough/cold (Wheeze)",
        ],
    ),
    (
        "diarrhoea",
        "DIARRHOEA:",
        &[
            "Severe dehydration",
            "Some dehydration",
            "No dehydration",
            "Severe persistent",
            "Persistent",
            "Dysentery",
        ],
    ),
    (
        "fever_malaria",
        "FEVER:",
        &[
            "Very severe febrile disease",
            "Malaria",
            "Fever - malaria unlikely",
            "Severe complicated measles",
            "Measles - Eye/mouth complications",
            "Measles",
        ],
    ),
    (
        "ear",
        "EAR:",
        &[
            "Mastoiditis",
            "Acute ear infection",
            "Chronic ear infection",
            "No ear infection",
        ],
    ),
    (
        "malnutrition",
        "MALNUTRITION:",
        &[
            "Complicated Severe Acute malnutrition (SAM)",
            "Un-complicated Severe Acute malnutrition (SAM)",
            "Moderate Acute malnutrition (MAM)",
            "No Acute Malnutrition",
        ],
    ),
    (
        "anaemia",
        "ANAEMIA:",
        &["Severe Anaemia", "Anaemia", "No anaemia"],
    ),
    (
        "identify_treatment",
        "IDENTIFY TREATMENT:",
        &["IDENTIFY TREATMENTS NEEDED"],
    ),
    (
        "treatment_2_59m",
        "TREAT:",
        &["ORAL DRUGS", "PLAN A", "PLAN B", "LOCAL INFECTION"],
    ),
    (
        "counsel",
        "COUNSEL:",
        &[
            "Assess and counsel for vaccination",
            "Asks feeding questions",
            "Feeding problems identified",
            "Gives advice on feeding problems",
            "COUNSEL WHEN TO RETURN",
        ],
    ),
];

const IMNCI_0_59_DAYS: DomainTable = &[
    (
        "bacterial",
        "BACTERIAL:",
        &[
            "Possible serious bacterial infection",
            "Local bacterial infection",
            "Bacterial infection unlikely",
        ],
    ),
    (
        "jaundice",
        "JAUNDICE:",
        &["Severe Jaundice", "Jaundice", "No Jaundice"],
    ),
    (
        "vyi_diarrhoea",
        "DIARRHOEA:",
        &[
            "Severe dehydration",
            "Some dehydration",
            "No dehydration",
            "Persistent diarrhea",
            "Blood in Stool",
        ],
    ),
    (
        "feeding",
        "FEEDING:",
        &[
            "Breastfeeding attachment and suckling assessed",
            "Feeding problem or low weight",
            "No feeding problem",
        ],
    ),
    (
        "identify_treatment",
        "IDENTIFY TREATMENT:",
        &["IDENTIFY TREATMENTS NEEDED"],
    ),
    (
        "treatment_0_59d",
        "TREATMENT/COUNSEL:",
        &[
            "Teach correct positioning and attachment",
            "Advise on home care",
        ],
    ),
];

const ETAT: DomainTable = &[
    (
        "triage",
        "Triage",
        &["Triage Assessment", "Assigns Triage Category"],
    ),
    (
        "airway_breathing",
        "Airway and Breathing",
        &[
            "Positions Airway",
            "Suctions",
            "Gives Oxygen",
            "Bag-Mask Ventilation",
        ],
    ),
    (
        "circulation",
        "Circulation",
        &["Inserts IV/IO", "Gives IV fluids", "Checks blood sugar"],
    ),
    (
        "coma",
        "Coma",
        &["Positions unresponsive child", "Gives IV fluids"],
    ),
    (
        "convulsion",
        "Convulsion",
        &["Positions convulsing child", "Gives Diazepam"],
    ),
    (
        "dehydration",
        "Dehydration (Severe)",
        &["Assesses dehydration", "Gives IV fluids", "Reassesses"],
    ),
];

const EENC_BREATHING: DomainTable = &[
    (
        "pre_birth",
        "Pre-birth preparations",
        &[
            "Checked room temperature and turned off fans",
            "Told the mother (and her support person) what is going to be done",
            "Washed hands (first of two hand washings)",
            "Placed dry cloth on mother's abdomen",
            "Prepared the newborn resuscitation area",
            "Checked that bag and mask are functional",
            "Washed hands (second of two hand washings)",
            "Put on two pairs of clean gloves",
            "Put forceps, cord clamp in easy-to-use order",
        ],
    ),
    (
        "eenc",
        "Early Essential Newborn Care",
        &[
            "Call out time of birth",
            "Start Drying within 5 seconds of birth",
            "Dry the baby thoroughly",
            "Stimulate baby by gently rubbing",
            "Suction only if airway blocked",
            "Remove the wet cloth",
            "Put baby in direct skin-to-skin contact",
            "Cover baby’s body with dry cloth and the head with a hat",
        ],
    ),
    (
        "oxytocin",
        "Give Oxytocin to mother",
        &[
            "Check for a second baby",
            "Give oxytocin to mother within 1 minute of delivery",
        ],
    ),
    (
        "cord_clamp",
        "Clamp the cord",
        &[
            "Removed outer pair of gloves",
            "Check cord pulsations, clamp after cord pulsations stopped",
            "Place clamp at 2 cm, forceps at 5 cm",
        ],
    ),
    (
        "placenta",
        "Deliver the placenta and counsel the mother",
        &["Delivered placenta", "Counsel mother on feeding cues"],
    ),
];

const EENC_NOT_BREATHING: DomainTable = &[
    (
        "pre_birth",
        "Pre-birth preparations",
        &[
            "Checked room temperature and turned off fans",
            "Told the mother what is going to be done",
            "Washed hands (first of two hand washings)",
            "Placed dry cloth on mother's abdomen",
            "Prepared the newborn resuscitation area",
            "Checked that bag and mask are functional",
            "Washed hands (second of two hand washings)",
            "Put on two pairs of clean gloves",
            "Put forceps, cord clamp in easy-to-use order",
        ],
    ),
    (
        "eenc_initial",
        "Initial EENC Steps (40 sec)",
        &[
            "Called out time of birth",
            "Started Drying within 5 seconds of birth",
            "Dried the baby thoroughly",
            "Stimulated baby by gently rubbing",
            "Suction only if airway blocked",
            "Removed the wet cloth",
            "Put baby in direct skin-to-skin contact",
            "Covered baby’s body with cloth and the head with a hat",
        ],
    ),
    (
        "if_not_breathing",
        "If baby not crying or not breathing",
        &[
            "Called for help",
            "Removed outer pair of gloves",
            "Quickly clamped and cut cord",
            "Moved baby to resuscitation area",
            "Covered baby quickly during and after transfer",
        ],
    ),
    (
        "resuscitation",
        "Resuscitation",
        &[
            "Positioned the head correctly to open airways",
            "Applied face mask firmly",
            "Gain chest rise within < 1 min of birth",
            "Squeezed bag to give 30–50 breaths per minute",
            "If chest not rising: Reposition head, reposition mask, check airway, squeeze harder",
        ],
    ),
    (
        "if_breathing_starts",
        "If baby starts breathing well",
        &[
            "Stop ventilation and monitor every 15 minutes",
            "Return baby to skin-to-skin contact and cover baby",
            "Counsel mother that baby is OK",
        ],
    ),
    (
        "post_resuscitation",
        "Post-resuscitation care",
        &[
            "Check for a second baby",
            "Give oxytocin to mother within 1 minute of delivery",
            "Delivered placenta",
            "Counsel mother on feeding cues",
        ],
    ),
    (
        "if_not_breathing_after_10_min",
        "If baby not breathing after 10 minutes",
        &[
            "If heart rate, continue ventilation, Refer and transport",
            "If no heart rate, stop ventilation, provide emotional support",
        ],
    ),
];

/// A named clinical domain and its ordered items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSpec {
    /// Key stored on observations (e.g. `airway_breathing`).
    pub key: String,
    /// Display label (e.g. "Airway and Breathing").
    pub label: String,
    /// Skill or classification texts, in report order.
    #[serde(default)]
    pub items: Vec<String>,
}

/// Ordered domains for one protocol scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub domains: Vec<DomainSpec>,
}

impl Taxonomy {
    fn from_table(table: DomainTable) -> Self {
        Self {
            domains: table
                .iter()
                .map(|(key, label, items)| DomainSpec {
                    key: key.to_string(),
                    label: label.to_string(),
                    items: items.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        }
    }

    pub fn domain(&self, key: &str) -> Option<&DomainSpec> {
        self.domains.iter().find(|d| d.key == key)
    }

    /// Position of a domain in report order.
    pub fn domain_position(&self, key: &str) -> Option<usize> {
        self.domains.iter().position(|d| d.key == key)
    }

    /// Display label for a domain key, falling back to the key itself.
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.domain(key).map(|d| d.label.as_str()).unwrap_or(key)
    }

    /// Number of items across all domains.
    pub fn item_count(&self) -> usize {
        self.domains.iter().map(|d| d.items.len()).sum()
    }

    /// Concatenate taxonomies; a domain key already seen keeps its first
    /// position and gains any items it did not list yet.
    pub fn merged<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a Taxonomy>,
    {
        let mut merged = Taxonomy::default();

        for part in parts {
            for domain in &part.domains {
                match merged.domains.iter_mut().find(|d| d.key == domain.key) {
                    Some(existing) => {
                        for item in &domain.items {
                            if !existing.items.contains(item) {
                                existing.items.push(item.clone());
                            }
                        }
                    }
                    None => merged.domains.push(domain.clone()),
                }
            }
        }

        merged
    }
}

/// Replacement taxonomy for one scenario, read from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyOverride {
    pub scenario: Scenario,
    pub domains: Vec<DomainSpec>,
}

/// Lookup of taxonomies by scenario and protocol.
#[derive(Debug, Clone)]
pub struct TaxonomyRegistry {
    by_scenario: HashMap<Scenario, Taxonomy>,
}

impl TaxonomyRegistry {
    /// Registry holding the built-in curricula.
    pub fn builtin() -> Self {
        let by_scenario = [
            (Scenario::Under2Months, IMNCI_0_59_DAYS),
            (Scenario::From2MonthsTo5Years, IMNCI_2_59_MONTHS),
            (Scenario::Etat, ETAT),
            (Scenario::Breathing, EENC_BREATHING),
            (Scenario::NotBreathing, EENC_NOT_BREATHING),
        ]
        .into_iter()
        .map(|(scenario, table)| (scenario, Taxonomy::from_table(table)))
        .collect();

        Self { by_scenario }
    }

    /// Built-in registry with scenario taxonomies replaced by `overrides`.
    pub fn with_overrides(overrides: &[TaxonomyOverride]) -> Self {
        let mut registry = Self::builtin();

        for entry in overrides {
            let taxonomy = Taxonomy {
                domains: entry.domains.clone(),
            };
            debug!(
                "Overriding {} taxonomy ({} domains, {} items)",
                entry.scenario.tag(),
                taxonomy.domains.len(),
                taxonomy.item_count()
            );
            registry.by_scenario.insert(entry.scenario, taxonomy);
        }

        registry
    }

    pub fn scenario(&self, scenario: Scenario) -> &Taxonomy {
        // Every scenario is populated by `builtin`.
        &self.by_scenario[&scenario]
    }

    /// All scenarios of a protocol merged into one domain order.
    pub fn protocol(&self, protocol: Protocol) -> Taxonomy {
        Taxonomy::merged(protocol.scenarios().iter().map(|s| self.scenario(*s)))
    }
}

impl Default for TaxonomyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_scenario() {
        let registry = TaxonomyRegistry::builtin();
        for protocol in [Protocol::Imnci, Protocol::Etat, Protocol::Eenc] {
            for scenario in protocol.scenarios() {
                assert!(!registry.scenario(*scenario).domains.is_empty());
            }
        }
    }

    #[test]
    fn test_etat_domain_order() {
        let registry = TaxonomyRegistry::builtin();
        let keys: Vec<_> = registry
            .protocol(Protocol::Etat)
            .domains
            .iter()
            .map(|d| d.key.clone())
            .collect();
        assert_eq!(
            keys,
            vec![
                "triage",
                "airway_breathing",
                "circulation",
                "coma",
                "convulsion",
                "dehydration"
            ]
        );
    }

    #[test]
    fn test_eenc_protocol_merges_shared_domains() {
        let registry = TaxonomyRegistry::builtin();
        let merged = registry.protocol(Protocol::Eenc);

        // pre_birth appears in both scenarios but only once in the merge.
        let pre_birth: Vec<_> = merged
            .domains
            .iter()
            .filter(|d| d.key == "pre_birth")
            .collect();
        assert_eq!(pre_birth.len(), 1);
        assert_eq!(merged.domain_position("pre_birth"), Some(0));
        assert_eq!(merged.domain_position("eenc"), Some(1));
        assert!(merged.domain("resuscitation").is_some());
        assert!(pre_birth[0]
            .items
            .contains(&"Told the mother what is going to be done".to_string()));
    }

    #[test]
    fn test_imnci_identify_treatment_shared_between_age_groups() {
        let registry = TaxonomyRegistry::builtin();
        assert!(registry
            .scenario(Scenario::Under2Months)
            .domain("identify_treatment")
            .is_some());
        assert!(registry
            .scenario(Scenario::From2MonthsTo5Years)
            .domain("identify_treatment")
            .is_some());
        assert_eq!(registry.scenario(Scenario::Etat).item_count(), 16);
    }

    #[test]
    fn test_label_falls_back_to_key() {
        let registry = TaxonomyRegistry::builtin();
        let etat = registry.scenario(Scenario::Etat);
        assert_eq!(etat.label("airway_breathing"), "Airway and Breathing");
        assert_eq!(etat.label("unknown_domain"), "unknown_domain");
    }

    #[test]
    fn test_override_replaces_scenario() {
        let overrides = vec![TaxonomyOverride {
            scenario: Scenario::Etat,
            domains: vec![DomainSpec {
                key: "triage".to_string(),
                label: "Triage".to_string(),
                items: vec!["Only item".to_string()],
            }],
        }];

        let registry = TaxonomyRegistry::with_overrides(&overrides);
        assert_eq!(registry.scenario(Scenario::Etat).item_count(), 1);
        assert_eq!(registry.scenario(Scenario::Breathing).domains.len(), 5);
    }
}
