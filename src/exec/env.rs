use super::plan::Plan;
use super::stats::Counters;
use crate::boundary::{BoundaryPolicy, Sample};
use crate::buffer::{Buffer, ElemType};
use crate::graph::{Point, StageGraph, StageId, StageKind};

/// Read context handed to stage definitions.
///
/// Holds the buffers visible at the current point of execution: inputs, root
/// buffers and the buffers of the enclosing tile. Reads of a stage without a
/// covering buffer evaluate it inline.
#[derive(Clone)]
pub struct Env<'a> {
    graph: &'a StageGraph,
    plan: &'a Plan,
    counters: &'a Counters,
    slots: Vec<Option<&'a Buffer>>,
}

impl<'a> Env<'a> {
    pub(crate) fn new(
        graph: &'a StageGraph,
        plan: &'a Plan,
        counters: &'a Counters,
        inputs: &[&'a Buffer],
    ) -> Self {
        let mut slots = vec![None; graph.len()];
        for (id, stage) in graph.stages() {
            if let StageKind::Input { slot, .. } = stage.kind() {
                slots[id.index()] = inputs.get(*slot).copied();
            }
        }
        Self {
            graph,
            plan,
            counters,
            slots,
        }
    }

    /// Copy of this context that also sees `buffers`.
    pub(crate) fn overlay<'b, I>(&self, buffers: I) -> Env<'b>
    where
        'a: 'b,
        I: IntoIterator<Item = (StageId, &'b Buffer)>,
    {
        let mut env: Env<'b> = self.clone();
        for (id, buf) in buffers {
            env.slots[id.index()] = Some(buf);
        }
        env
    }

    pub(crate) fn counters(&self) -> &'a Counters {
        self.counters
    }

    /// Value of stage `id` at `(x, y, c)`.
    #[inline]
    pub fn at(&self, id: StageId, x: i64, y: i64, c: usize) -> f64 {
        let stage = self.graph.stage(id);
        match stage.kind() {
            StageKind::Input { boundary, .. } => match self.slots[id.index()] {
                Some(buf) => sample_input(buf, stage.elem(), *boundary, x, y, c),
                None => 0.0,
            },
            StageKind::Func { .. } => {
                if let Some(buf) = self.slots[id.index()] {
                    if buf.contains(x, y) {
                        return buf.get(x, y, c);
                    }
                }
                if self.plan.is_materialized(id) {
                    self.counters.fallback();
                }
                self.eval(id, Point::new(x, y, c))
            }
        }
    }

    /// Evaluate a computed stage at one point, narrowing after the pure
    /// definition and after every update step.
    pub(crate) fn eval(&self, id: StageId, p: Point) -> f64 {
        let stage = self.graph.stage(id);
        let StageKind::Func { pure, updates } = stage.kind() else {
            return self.at(id, p.x, p.y, p.c);
        };
        let elem = stage.elem();
        let mut value = elem.narrow(pure(self, p));
        for update in updates {
            update
                .domain
                .for_each(|r| value = elem.narrow((update.body)(self, p, r, value)));
        }
        self.counters.evaluated(id);
        value
    }
}

#[inline]
fn sample_input(
    buf: &Buffer,
    elem: ElemType,
    policy: BoundaryPolicy,
    x: i64,
    y: i64,
    c: usize,
) -> f64 {
    let r = buf.region();
    let ix = match policy.resolve(x - r.x, r.w.max(0) as usize) {
        Sample::At(i) => i as i64,
        Sample::Fill(v) => return elem.narrow(v),
    };
    let iy = match policy.resolve(y - r.y, r.h.max(0) as usize) {
        Sample::At(i) => i as i64,
        Sample::Fill(v) => return elem.narrow(v),
    };
    buf.get(r.x + ix, r.y + iy, c)
}
