use crate::error::GraphError;
use crate::graph::AudioGraph;

/// Bookkeeping for every long-lived node of an ambient session.
///
/// Sources (oscillators, LFOs, constant offsets) must be stopped; everything
/// else (gains, filters, delays) must be disconnected. Both lists are empty
/// before a session starts and after [`release_all`](Self::release_all).
#[derive(Debug)]
pub struct ResourceTracker<N> {
    sources: Vec<N>,
    aux: Vec<N>,
}

impl<N> Default for ResourceTracker<N> {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            aux: Vec::new(),
        }
    }
}

/// What a teardown did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Teardown {
    pub stopped: usize,
    pub disconnected: usize,
    /// Nodes the platform (or an earlier teardown) had already let go of.
    pub already_released: usize,
    /// Unexpected backend failures, logged and otherwise ignored.
    pub failed: usize,
}

impl<N: Clone> ResourceTracker<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a source node and hand it back.
    pub fn source(&mut self, node: N) -> N {
        self.sources.push(node.clone());
        node
    }

    /// Record a gain, filter or delay node and hand it back.
    pub fn aux(&mut self, node: N) -> N {
        self.aux.push(node.clone());
        node
    }

    pub fn sources(&self) -> &[N] {
        &self.sources
    }

    pub fn aux_nodes(&self) -> &[N] {
        &self.aux
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.aux.is_empty()
    }

    /// Stop every source, disconnect every node, and forget them all.
    ///
    /// Never fails: [`GraphError::AlreadyReleased`] is an expected outcome
    /// and anything else is logged.
    pub fn release_all<G>(&mut self, graph: &mut G) -> Teardown
    where
        G: AudioGraph<Node = N>,
    {
        let mut report = Teardown::default();
        let now = graph.current_time();
        for node in self.sources.drain(..) {
            match graph.stop(&node, now) {
                Ok(()) => report.stopped += 1,
                Err(e) => tally(&mut report, &e),
            }
            // Stopped sources are still wired into the graph until disconnected.
            if graph.disconnect(&node).is_ok() {
                report.disconnected += 1;
            }
        }
        for node in self.aux.drain(..) {
            match graph.disconnect(&node) {
                Ok(()) => report.disconnected += 1,
                Err(e) => tally(&mut report, &e),
            }
        }
        report
    }
}

fn tally(report: &mut Teardown, err: &GraphError) {
    if err.is_already_released() {
        report.already_released += 1;
    } else {
        log::debug!("[ambient] teardown error ignored: {err}");
        report.failed += 1;
    }
}
