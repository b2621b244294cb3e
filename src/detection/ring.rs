//! Fraud ring detection over shared identifying attributes.
//!
//! Applications are partitioned into connected components of the relation
//! "shares a non-empty value of any configured attribute". The scan is rebuilt
//! from the full store on every job; no state is carried between runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Attribute that links two applications when the values are equal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAttribute {
    FinancialAccount,
    AssetRegistration,
}

impl LinkAttribute {
    pub fn label(&self) -> &'static str {
        match self {
            LinkAttribute::FinancialAccount => "financial account",
            LinkAttribute::AssetRegistration => "asset registration",
        }
    }
}

impl fmt::Display for LinkAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Projection of a stored application used by the full-store scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub applicant_id: String,
    pub financial_account: String,
    pub asset_registration: String,
}

impl LinkRecord {
    pub fn value(&self, attribute: LinkAttribute) -> &str {
        match attribute {
            LinkAttribute::FinancialAccount => &self.financial_account,
            LinkAttribute::AssetRegistration => &self.asset_registration,
        }
    }
}

/// A connected component at or above the flag threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    /// Sorted member identities
    pub members: Vec<String>,
}

impl Ring {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Rings found in one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingReport {
    rings: Vec<Ring>,
    membership: HashMap<String, usize>,
}

impl RingReport {
    /// Rings ordered by their smallest member identity
    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn ring_for(&self, applicant_id: &str) -> Option<&Ring> {
        self.membership
            .get(applicant_id)
            .map(|&index| &self.rings[index])
    }

    /// Size of the applicant's ring, or 0 when not in a flagged ring
    pub fn flag_count_for(&self, applicant_id: &str) -> usize {
        self.ring_for(applicant_id).map(Ring::size).unwrap_or(0)
    }

    /// Number of applications inside any ring
    pub fn flagged_applications(&self) -> usize {
        self.membership.len()
    }
}

/// Union-find over record indices
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            // path halving
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return;
        }
        // Larger set wins; ties go to the lower index so roots are stable.
        let (root, child) = match self.size[root_a].cmp(&self.size[root_b]) {
            std::cmp::Ordering::Greater => (root_a, root_b),
            std::cmp::Ordering::Less => (root_b, root_a),
            std::cmp::Ordering::Equal => (root_a.min(root_b), root_a.max(root_b)),
        };
        self.parent[child] = root;
        self.size[root] += self.size[child];
    }
}

/// Groups applications sharing identifying attributes and flags large groups
#[derive(Debug, Clone)]
pub struct RingDetector {
    attributes: Vec<LinkAttribute>,
    threshold: usize,
}

impl RingDetector {
    pub fn new(attributes: impl IntoIterator<Item = LinkAttribute>, threshold: usize) -> Self {
        let mut attributes: Vec<LinkAttribute> = attributes.into_iter().collect();
        attributes.sort();
        attributes.dedup();

        Self {
            attributes,
            threshold: threshold.max(1),
        }
    }

    pub fn attributes(&self) -> &[LinkAttribute] {
        &self.attributes
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Human-readable list of the linking attributes
    pub fn describe_attributes(&self) -> String {
        self.attributes
            .iter()
            .map(LinkAttribute::label)
            .collect::<Vec<_>>()
            .join(" or ")
    }

    /// Partition `records` and return every component of size >= threshold.
    ///
    /// Records are processed in identity order, so the result does not depend on
    /// the order the store returned them in. Duplicate identities are collapsed.
    pub fn detect(&self, records: &[LinkRecord]) -> RingReport {
        let mut ordered: Vec<&LinkRecord> = records.iter().collect();
        ordered.sort_by(|a, b| a.applicant_id.cmp(&b.applicant_id));
        ordered.dedup_by(|a, b| a.applicant_id == b.applicant_id);

        let mut sets = DisjointSet::new(ordered.len());
        for &attribute in &self.attributes {
            let mut first_seen: HashMap<&str, usize> = HashMap::new();
            for (index, record) in ordered.iter().enumerate() {
                let value = record.value(attribute).trim();
                if value.is_empty() {
                    continue;
                }
                match first_seen.get(value) {
                    Some(&anchor) => sets.union(anchor, index),
                    None => {
                        first_seen.insert(value, index);
                    }
                }
            }
        }

        let mut components: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (index, record) in ordered.iter().enumerate() {
            let root = sets.find(index);
            components
                .entry(root)
                .or_default()
                .push(record.applicant_id.clone());
        }

        // Members were pushed in identity order, so each list is already sorted.
        let mut rings: Vec<Ring> = components
            .into_values()
            .filter(|members| members.len() >= self.threshold)
            .map(|members| Ring { members })
            .collect();
        rings.sort_by(|a, b| a.members[0].cmp(&b.members[0]));

        let mut membership = HashMap::new();
        for (index, ring) in rings.iter().enumerate() {
            for member in &ring.members {
                membership.insert(member.clone(), index);
            }
        }

        RingReport { rings, membership }
    }
}

impl Default for RingDetector {
    fn default() -> Self {
        Self::new([LinkAttribute::FinancialAccount], 3)
    }
}
