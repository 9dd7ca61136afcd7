//! Reaction records and the dataset they accumulate into

use serde::{Deserialize, Serialize};

/// Stored in place of the reaction SMILES when a panel does not expose one
pub const UNAVAILABLE_SMILES: &str = "N/A";

/// Separator used for the name fields
pub const NAME_SEPARATOR: &str = ", ";

/// One reaction from one visible panel of one archive page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionRecord {
    /// Archive page the reaction was found on
    #[serde(default)]
    pub page_url: String,

    /// 1-based position of the panel among the page's visible panels
    #[serde(default)]
    pub reaction_id: usize,

    #[serde(default)]
    pub reactant: String,

    #[serde(default)]
    pub solvent: String,

    #[serde(default)]
    pub product: String,

    /// Rows with an unrecognized role, as `"role: name"`
    #[serde(default)]
    pub others: String,

    /// Reaction SMILES, or [`UNAVAILABLE_SMILES`]
    #[serde(default = "unavailable")]
    pub main_smiles: String,

    #[serde(default)]
    pub reactant_smiles: Vec<String>,

    #[serde(default)]
    pub product_smiles: Vec<String>,
}

fn unavailable() -> String {
    UNAVAILABLE_SMILES.to_string()
}

impl ReactionRecord {
    pub fn has_main_smiles(&self) -> bool {
        self.main_smiles != UNAVAILABLE_SMILES
    }

    pub fn reactants(&self) -> impl Iterator<Item = &str> {
        split_names(&self.reactant)
    }

    pub fn solvents(&self) -> impl Iterator<Item = &str> {
        split_names(&self.solvent)
    }

    pub fn products(&self) -> impl Iterator<Item = &str> {
        split_names(&self.product)
    }
}

fn split_names(joined: &str) -> impl Iterator<Item = &str> {
    joined.split(NAME_SEPARATOR).filter(|name| !name.is_empty())
}

/// Role of a row in a reaction's detail table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reactant,
    Solvent,
    Product,
    Other,
}

impl Role {
    /// Classify a lowercased role string.
    ///
    /// Substring tests run in the order reactant, solvent, product, so
    /// `"reactant solvent"` is a reactant and `"solvent product"` a solvent.
    pub fn classify(role: &str) -> Self {
        if role.contains("reactant") {
            Role::Reactant
        } else if role.contains("solvent") {
            Role::Solvent
        } else if role.contains("product") {
            Role::Product
        } else {
            Role::Other
        }
    }

    /// Whether rows with this role text get a profile lookup for their SMILES
    pub fn wants_structure(role: &str) -> bool {
        role.contains("reactant") || role.contains("product")
    }
}

/// Names and structures collected from one detail table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleBuckets {
    pub reactants: Vec<String>,
    pub solvents: Vec<String>,
    pub products: Vec<String>,
    pub others: Vec<String>,
    pub reactant_smiles: Vec<String>,
    pub product_smiles: Vec<String>,
}

impl RoleBuckets {
    /// File one row. SMILES are kept for reactants and products only, and only when non-empty.
    pub fn dispatch(&mut self, role: &str, name: String, smiles: Option<String>) -> Role {
        let smiles = smiles.filter(|s| !s.is_empty());
        let classified = Role::classify(role);
        match classified {
            Role::Reactant => {
                self.reactants.push(name);
                self.reactant_smiles.extend(smiles);
            }
            Role::Solvent => self.solvents.push(name),
            Role::Product => {
                self.products.push(name);
                self.product_smiles.extend(smiles);
            }
            Role::Other => self.others.push(format!("{}: {}", role, name)),
        }
        classified
    }

    pub fn into_record(self, page_url: &str, reaction_id: usize, main_smiles: String) -> ReactionRecord {
        ReactionRecord {
            page_url: page_url.to_string(),
            reaction_id,
            reactant: self.reactants.join(NAME_SEPARATOR),
            solvent: self.solvents.join(NAME_SEPARATOR),
            product: self.products.join(NAME_SEPARATOR),
            others: self.others.join(NAME_SEPARATOR),
            main_smiles,
            reactant_smiles: self.reactant_smiles,
            product_smiles: self.product_smiles,
        }
    }
}

/// Ordered, append-only collection of records
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<ReactionRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any record came from `page_url`
    pub fn contains(&self, page_url: &str) -> bool {
        self.records.iter().any(|r| r.page_url == page_url)
    }

    pub fn extend(&mut self, batch: impl IntoIterator<Item = ReactionRecord>) {
        self.records.extend(batch);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ReactionRecord] {
        &self.records
    }

    /// Distinct source pages in first-seen order
    pub fn pages(&self) -> Vec<&str> {
        let mut pages: Vec<&str> = Vec::new();
        for record in &self.records {
            if !pages.contains(&record.page_url.as_str()) {
                pages.push(&record.page_url);
            }
        }
        pages
    }
}

impl From<Vec<ReactionRecord>> for Dataset {
    fn from(records: Vec<ReactionRecord>) -> Self {
        Self { records }
    }
}
