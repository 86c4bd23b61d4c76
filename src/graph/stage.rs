use crate::boundary::BoundaryPolicy;
use crate::buffer::{ElemType, Region, Span};
use crate::exec::Env;

/// Index of a stage inside its [`StageGraph`](super::StageGraph).
///
/// Producers are always added before their consumers, so ids double as a
/// topological order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub(crate) usize);

impl StageId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One output coordinate of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
    pub c: usize,
}

impl Point {
    pub const fn new(x: i64, y: i64, c: usize) -> Self {
        Self { x, y, c }
    }
}

/// Declared read pattern of a consumer on one producer: for an output point
/// `(x, y)` the consumer reads `(x + dx, y + dy)` for every offset in the spans.
/// Channels are not tracked; a consumer may read any producer channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    pub producer: StageId,
    pub dx: Span,
    pub dy: Span,
}

impl Access {
    /// Producer region needed to compute the consumer over `region`.
    #[inline]
    pub fn required(&self, region: &Region) -> Region {
        region.expand(self.dx, self.dy)
    }
}

/// Rectangular integer domain iterated by an update definition.
///
/// Each dimension is an inclusive [`Span`]; the visiting order is row-major
/// with the first dimension fastest, but updates must not depend on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReductionDomain {
    dims: Vec<Span>,
}

impl ReductionDomain {
    pub fn new(dims: Vec<Span>) -> Self {
        Self { dims }
    }

    /// One-dimensional domain.
    pub fn range(span: Span) -> Self {
        Self { dims: vec![span] }
    }

    /// Two-dimensional domain `dx × dy`.
    pub fn rect(dx: Span, dy: Span) -> Self {
        Self { dims: vec![dx, dy] }
    }

    pub fn dims(&self) -> &[Span] {
        &self.dims
    }

    /// Number of points; zero when any dimension is empty.
    pub fn len(&self) -> usize {
        self.dims
            .iter()
            .map(|s| s.width().max(0) as usize)
            .product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every point of the domain.
    pub fn for_each(&self, mut f: impl FnMut(&[i64])) {
        if self.is_empty() {
            return;
        }
        let mut r: Vec<i64> = self.dims.iter().map(|s| s.lo).collect();
        loop {
            f(&r);
            let mut d = 0;
            loop {
                if d == r.len() {
                    return;
                }
                r[d] += 1;
                if r[d] <= self.dims[d].hi {
                    break;
                }
                r[d] = self.dims[d].lo;
                d += 1;
            }
        }
    }
}

/// Pure definition: value of the stage at one point.
pub type PureFn = Box<dyn Fn(&Env<'_>, Point) -> f64 + Send + Sync>;
/// Update definition: new value from the point, the reduction coordinate and
/// the running (already narrowed) value.
pub type UpdateFn = Box<dyn Fn(&Env<'_>, Point, &[i64], f64) -> f64 + Send + Sync>;

pub struct Update {
    pub domain: ReductionDomain,
    pub body: UpdateFn,
}

pub enum StageKind {
    /// Caller-supplied buffer read through a boundary policy.
    Input { slot: usize, boundary: BoundaryPolicy },
    /// Computed stage: the pure definition initializes every point, then each
    /// update sweeps its reduction domain.
    Func { pure: PureFn, updates: Vec<Update> },
}

pub struct Stage {
    pub(crate) name: String,
    pub(crate) elem: ElemType,
    pub(crate) channels: usize,
    pub(crate) kind: StageKind,
    pub(crate) accesses: Vec<Access>,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elem(&self) -> ElemType {
        self.elem
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, StageKind::Input { .. })
    }

    /// Boundary policy for input stages.
    pub fn boundary(&self) -> Option<BoundaryPolicy> {
        match self.kind {
            StageKind::Input { boundary, .. } => Some(boundary),
            StageKind::Func { .. } => None,
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            StageKind::Input { slot, boundary } => format!("input#{slot} {boundary:?}"),
            StageKind::Func { updates, .. } => format!("func +{} updates", updates.len()),
        };
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("elem", &self.elem)
            .field("channels", &self.channels)
            .field("kind", &kind)
            .field("accesses", &self.accesses)
            .finish()
    }
}

/// Builder for a computed stage, consumed by [`StageGraph::add`](super::StageGraph::add).
pub struct FuncDef {
    pub(crate) name: String,
    pub(crate) elem: ElemType,
    pub(crate) channels: usize,
    pub(crate) accesses: Vec<Access>,
    pub(crate) pure: Option<PureFn>,
    pub(crate) updates: Vec<Update>,
}

impl FuncDef {
    pub fn new(name: impl Into<String>, elem: ElemType) -> Self {
        Self {
            name: name.into(),
            elem,
            channels: 1,
            accesses: Vec::new(),
            pure: None,
            updates: Vec::new(),
        }
    }

    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Declare that the stage reads `producer` at offsets `dx × dy`.
    pub fn reads(mut self, producer: StageId, dx: Span, dy: Span) -> Self {
        self.accesses.push(Access { producer, dx, dy });
        self
    }

    pub fn pure<F>(mut self, f: F) -> Self
    where
        F: Fn(&Env<'_>, Point) -> f64 + Send + Sync + 'static,
    {
        self.pure = Some(Box::new(f));
        self
    }

    pub fn update<F>(mut self, domain: ReductionDomain, f: F) -> Self
    where
        F: Fn(&Env<'_>, Point, &[i64], f64) -> f64 + Send + Sync + 'static,
    {
        self.updates.push(Update {
            domain,
            body: Box::new(f),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_domain_visits_every_point_once() {
        let dom = ReductionDomain::rect(Span::radius(1), Span::half_open(-4, 4));
        assert_eq!(dom.len(), 24);
        let mut seen = Vec::new();
        dom.for_each(|r| seen.push((r[0], r[1])));
        assert_eq!(seen.len(), 24);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 24);
        assert_eq!(seen.first(), Some(&(-1, -4)));
        assert_eq!(seen.last(), Some(&(1, 3)));
    }

    #[test]
    fn empty_domain_visits_nothing() {
        let dom = ReductionDomain::range(Span::half_open(0, 0));
        assert!(dom.is_empty());
        let mut n = 0;
        dom.for_each(|_| n += 1);
        assert_eq!(n, 0);
    }

    #[test]
    fn access_required_expands_by_offsets() {
        let a = Access {
            producer: StageId(0),
            dx: Span::new(-8, 8),
            dy: Span::ZERO,
        };
        assert_eq!(
            a.required(&Region::new(0, 0, 16, 4)),
            Region::new(-8, 0, 32, 4)
        );
    }
}
