use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Range;

use crate::error::{Result, StructuralError};
use crate::math::Point2;

use super::feature::LayerRole;

/// Identifies one ring of one polygon of one feature.
///
/// Ordered by feature, then polygon, then ring. The sentinel vertex uses
/// the all-zero key; real feature ids start at 1, so it never collides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PartKey {
    pub feature: u32,
    pub polygon: u32,
    pub ring: u32,
}

impl PartKey {
    /// Key of the sentinel vertex.
    pub const SENTINEL: Self = Self {
        feature: 0,
        polygon: 0,
        ring: 0,
    };

    #[must_use]
    pub fn new(feature: u32, polygon: u32, ring: u32) -> Self {
        Self {
            feature,
            polygon,
            ring,
        }
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.feature, self.polygon, self.ring)
    }
}

/// Decimal packing of a [`PartKey`] into a single integer,
/// `m·q·feature + m·ring + polygon`, for table exports that expect one
/// numeric part column.
///
/// `m` and `q` are powers of ten strictly greater than the largest polygon
/// and ring index, so distinct keys never share a packed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPacking {
    m: u64,
    q: u64,
}

impl PartPacking {
    /// Sizes the packing for a set of keys.
    pub fn for_keys<'a>(keys: impl IntoIterator<Item = &'a PartKey>) -> Self {
        let (max_polygon, max_ring) = keys
            .into_iter()
            .fold((0, 0), |(p, r), k| (p.max(k.polygon), r.max(k.ring)));
        Self {
            m: decimal_width(max_polygon),
            q: decimal_width(max_ring),
        }
    }

    #[must_use]
    pub fn pack(&self, key: &PartKey) -> u64 {
        self.m * self.q * u64::from(key.feature) + self.m * u64::from(key.ring) + u64::from(key.polygon)
    }
}

/// Ten times the smallest power of ten not below `max(v, 1)`.
fn decimal_width(v: u32) -> u64 {
    let mut p = 1_u64;
    while p < u64::from(v.max(1)) {
        p *= 10;
    }
    p * 10
}

/// One boundary vertex after rounding and deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexRecord {
    pub point: Point2,
    /// 1-based feature index, 0 for the sentinel.
    pub feature_id: u32,
    pub part: PartKey,
    /// Position in the owning [`VertexSet`]; 0 is the sentinel.
    pub vertex_id: u32,
    pub is_buffered: bool,
    /// Feature attributes echoed onto the vertex.
    pub extra: BTreeMap<String, String>,
}

impl VertexRecord {
    /// The "no match" vertex placed at `(big_n, big_n)`.
    #[must_use]
    pub fn sentinel(big_n: f64) -> Self {
        Self {
            point: Point2::new(big_n, big_n),
            feature_id: 0,
            part: PartKey::SENTINEL,
            vertex_id: 0,
            is_buffered: false,
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.vertex_id == 0
    }
}

/// The deduplicated vertices of one layer.
///
/// Invariants, checked on construction: record `i` has `vertex_id == i`,
/// record 0 is the sentinel, and the records of each part are contiguous.
#[derive(Debug, Clone)]
pub struct VertexSet {
    layer: LayerRole,
    records: Vec<VertexRecord>,
    /// Record range of each part, in order of first appearance.
    spans: Vec<Range<usize>>,
    /// Index into `spans` for each record.
    span_of: Vec<usize>,
}

impl VertexSet {
    /// Builds a vertex set from records that already carry their ids.
    ///
    /// # Errors
    ///
    /// Returns a `StructuralError` if record 0 is not the sentinel, if ids
    /// are not contiguous positions, or if a part appears in two separate runs.
    pub fn from_records(layer: LayerRole, records: Vec<VertexRecord>) -> Result<Self> {
        match records.first() {
            Some(first) if first.is_sentinel() && first.part == PartKey::SENTINEL => {}
            _ => return Err(StructuralError::SentinelMissing.into()),
        }

        let mut spans: Vec<Range<usize>> = Vec::new();
        let mut span_of = Vec::with_capacity(records.len());
        let mut seen = HashSet::new();
        let mut current: Option<PartKey> = None;

        for (position, record) in records.iter().enumerate() {
            if usize::try_from(record.vertex_id).ok() != Some(position) {
                return Err(StructuralError::VertexIdGap {
                    position,
                    vertex_id: record.vertex_id,
                }
                .into());
            }
            if current == Some(record.part) {
                if let Some(span) = spans.last_mut() {
                    span.end = position + 1;
                }
            } else {
                if !seen.insert(record.part) {
                    return Err(StructuralError::NonContiguousPart {
                        part: record.part.to_string(),
                    }
                    .into());
                }
                spans.push(position..position + 1);
                current = Some(record.part);
            }
            span_of.push(spans.len() - 1);
        }

        Ok(Self {
            layer,
            records,
            spans,
            span_of,
        })
    }

    #[must_use]
    pub fn layer(&self) -> LayerRole {
        self.layer
    }

    /// All records, sentinel first.
    #[must_use]
    pub fn records(&self) -> &[VertexRecord] {
        &self.records
    }

    /// Records excluding the sentinel.
    #[must_use]
    pub fn real(&self) -> &[VertexRecord] {
        &self.records[1..]
    }

    /// Number of records including the sentinel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when the set holds only the sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.len() <= 1
    }

    #[must_use]
    pub fn get(&self, vertex_id: u32) -> Option<&VertexRecord> {
        self.records.get(usize::try_from(vertex_id).ok()?)
    }

    /// Record range of the part that holds `vertex_id`.
    #[must_use]
    pub fn part_span(&self, vertex_id: u32) -> Option<Range<usize>> {
        let position = usize::try_from(vertex_id).ok()?;
        let span = *self.span_of.get(position)?;
        self.spans.get(span).cloned()
    }

    /// Number of distinct parts, sentinel included.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.spans.len()
    }

    /// Packing sized for the parts of this set.
    #[must_use]
    pub fn part_packing(&self) -> PartPacking {
        PartPacking::for_keys(self.records.iter().map(|r| &r.part))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::InterfaceError;

    fn record(id: u32, part: PartKey, x: f64) -> VertexRecord {
        VertexRecord {
            point: Point2::new(x, 0.0),
            feature_id: part.feature,
            part,
            vertex_id: id,
            is_buffered: false,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn packing_never_collides() {
        let keys: Vec<PartKey> = (1..=3)
            .flat_map(|f| (0..12).flat_map(move |p| (0..4).map(move |r| PartKey::new(f, p, r))))
            .collect();
        let packing = PartPacking::for_keys(&keys);
        let packed: HashSet<u64> = keys.iter().map(|k| packing.pack(k)).collect();
        assert_eq!(packed.len(), keys.len());
    }

    #[test]
    fn packing_widths_follow_digit_count() {
        assert_eq!(decimal_width(0), 10);
        assert_eq!(decimal_width(1), 10);
        assert_eq!(decimal_width(5), 100);
        assert_eq!(decimal_width(10), 100);
        assert_eq!(decimal_width(11), 1000);
        let packing = PartPacking::for_keys(&[PartKey::new(7, 0, 0)]);
        assert_eq!(packing.pack(&PartKey::new(7, 0, 0)), 700);
        assert_eq!(packing.pack(&PartKey::SENTINEL), 0);
    }

    #[test]
    fn part_key_order_is_feature_polygon_ring() {
        let mut keys = vec![
            PartKey::new(2, 0, 0),
            PartKey::new(1, 1, 0),
            PartKey::new(1, 0, 1),
            PartKey::new(1, 0, 0),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                PartKey::new(1, 0, 0),
                PartKey::new(1, 0, 1),
                PartKey::new(1, 1, 0),
                PartKey::new(2, 0, 0),
            ]
        );
    }

    #[test]
    fn spans_group_parts() {
        let a = PartKey::new(1, 0, 0);
        let b = PartKey::new(2, 0, 0);
        let set = VertexSet::from_records(
            LayerRole::Urban,
            vec![
                VertexRecord::sentinel(1e6),
                record(1, a, 0.0),
                record(2, a, 1.0),
                record(3, b, 2.0),
            ],
        )
        .unwrap();
        assert_eq!(set.part_span(0), Some(0..1));
        assert_eq!(set.part_span(2), Some(1..3));
        assert_eq!(set.part_span(3), Some(3..4));
        assert_eq!(set.part_span(4), None);
        assert_eq!(set.part_count(), 3);
        assert_eq!(set.real().len(), 3);
    }

    #[test]
    fn missing_sentinel_is_structural() {
        let err = VertexSet::from_records(LayerRole::Urban, vec![record(1, PartKey::new(1, 0, 0), 0.0)])
            .unwrap_err();
        assert!(matches!(err, InterfaceError::Structural(StructuralError::SentinelMissing)));
    }

    #[test]
    fn id_gap_is_structural() {
        let a = PartKey::new(1, 0, 0);
        let err = VertexSet::from_records(
            LayerRole::Flammable,
            vec![VertexRecord::sentinel(1e6), record(2, a, 0.0)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            InterfaceError::Structural(StructuralError::VertexIdGap { position: 1, vertex_id: 2 })
        ));
    }

    #[test]
    fn split_part_is_structural() {
        let a = PartKey::new(1, 0, 0);
        let b = PartKey::new(2, 0, 0);
        let err = VertexSet::from_records(
            LayerRole::Urban,
            vec![
                VertexRecord::sentinel(1e6),
                record(1, a, 0.0),
                record(2, b, 1.0),
                record(3, a, 2.0),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            InterfaceError::Structural(StructuralError::NonContiguousPart { .. })
        ));
    }
}
