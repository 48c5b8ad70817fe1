//! Route-to-route hop matrix.

/// Hop count stored for pairs that were never discovered.
pub const UNREACHABLE: u8 = u8::MAX;

/// Square matrix of hop counts, row = from, column = to.
///
/// Not assumed symmetric.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HopsMatrix {
    size: usize,
    hops: Vec<u8>,
}

impl HopsMatrix {
    /// A matrix with zero on the diagonal and every other pair unreachable.
    pub fn new(size: usize) -> Self {
        let mut hops = vec![UNREACHABLE; size * size];
        for i in 0..size {
            hops[i * size + i] = 0;
        }
        Self { size, hops }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: u32, to: u32) -> u8 {
        self.slot(from, to).map_or(UNREACHABLE, |i| self.hops[i])
    }

    pub fn is_reachable(&self, from: u32, to: u32) -> bool {
        self.get(from, to) != UNREACHABLE
    }

    /// Record a hop count; out-of-range indices are ignored.
    pub fn set(&mut self, from: u32, to: u32, hops: u8) {
        if let Some(i) = self.slot(from, to) {
            self.hops[i] = hops;
        }
    }

    /// Number of off-diagonal pairs with a finite hop count.
    pub fn reachable_pairs(&self) -> usize {
        self.hops.iter().filter(|h| **h != 0 && **h != UNREACHABLE).count()
    }

    /// True if the shape is consistent, as checked after deserializing.
    pub fn is_well_formed(&self) -> bool {
        self.hops.len() == self.size * self.size
            && (0..self.size).all(|i| self.hops[i * self.size + i] == 0)
    }

    fn slot(&self, from: u32, to: u32) -> Option<usize> {
        let (from, to) = (from as usize, to as usize);
        (from < self.size && to < self.size).then_some(from * self.size + to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_matrix() {
        let m = HopsMatrix::new(3);
        assert_eq!(m.get(1, 1), 0);
        assert_eq!(m.get(0, 2), UNREACHABLE);
        assert!(!m.is_reachable(0, 2));
        assert_eq!(m.reachable_pairs(), 0);
        assert!(m.is_well_formed());
    }

    #[test]
    fn asymmetric_set() {
        let mut m = HopsMatrix::new(3);
        m.set(0, 2, 2);
        assert_eq!(m.get(0, 2), 2);
        assert_eq!(m.get(2, 0), UNREACHABLE);
        assert_eq!(m.reachable_pairs(), 1);
    }

    #[test]
    fn out_of_range_is_unreachable() {
        let mut m = HopsMatrix::new(2);
        m.set(5, 0, 1);
        assert_eq!(m.get(5, 0), UNREACHABLE);
        assert_eq!(m.get(0, 9), UNREACHABLE);
    }

    #[test]
    fn malformed_detected() {
        let m: HopsMatrix = serde_json::from_str(r#"{"size": 2, "hops": [0, 1, 1]}"#).unwrap();
        assert!(!m.is_well_formed());
    }
}
