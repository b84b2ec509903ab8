use serde::{Deserialize, Serialize};

/// The closed set of resource kinds that flow through the network.
///
/// The core never carries free-form resource strings; external callers that
/// hold strings (save loaders, UI forms) must go through
/// [`crate::validation::parse_resource_kind`], which fails closed on
/// anything not listed here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ResourceKind {
    Minerals,
    Energy,
    Population,
    Research,
    Plasma,
    Gas,
    Exotic,
}

impl ResourceKind {
    /// All kinds, in stable encoding order.
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Minerals,
        ResourceKind::Energy,
        ResourceKind::Population,
        ResourceKind::Research,
        ResourceKind::Plasma,
        ResourceKind::Gas,
        ResourceKind::Exotic,
    ];

    /// Canonical lowercase name, matching the external string encoding.
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Minerals => "minerals",
            ResourceKind::Energy => "energy",
            ResourceKind::Population => "population",
            ResourceKind::Research => "research",
            ResourceKind::Plasma => "plasma",
            ResourceKind::Gas => "gas",
            ResourceKind::Exotic => "exotic",
        }
    }

    /// Stable numeric encoding (index into [`ResourceKind::ALL`]).
    pub fn index(self) -> u32 {
        ResourceKind::ALL
            .iter()
            .position(|&k| k == self)
            .expect("kind missing from ALL") as u32
    }

    /// Look up a kind by canonical name. Returns None for unknown names;
    /// the mapping is exact, never a default.
    pub fn from_name(name: &str) -> Option<ResourceKind> {
        ResourceKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Look up a kind by its stable numeric encoding.
    pub fn from_index(index: u32) -> Option<ResourceKind> {
        ResourceKind::ALL.get(index as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trips() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn index_round_trips() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_index(kind.index()), Some(kind));
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(ResourceKind::from_name("antimatter"), None);
        assert_eq!(ResourceKind::from_name("Minerals"), None); // case-exact
        assert_eq!(ResourceKind::from_name(""), None);
    }

    #[test]
    fn out_of_range_index_is_none() {
        assert_eq!(ResourceKind::from_index(7), None);
        assert_eq!(ResourceKind::from_index(u32::MAX), None);
    }

    #[test]
    fn ordering_is_stable_for_btree_iteration() {
        let mut sorted = ResourceKind::ALL;
        sorted.sort();
        // Declaration order is the encoding order.
        assert_eq!(sorted, ResourceKind::ALL);
    }
}
