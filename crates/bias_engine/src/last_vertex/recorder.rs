//! Interaction-vertex recorder.
//!
//! Every interesting interaction inside the region becomes a
//! [`VertexRecord`] in a per-event arena. Each track keeps a
//! [`LineageEntry`] pointing at the vertices that matter to it, so that
//! when it leaves the region the vertex to replay can be found without
//! walking the track tree.

use std::collections::HashMap;

use bias_core::{Kinematics, ParticleKind, Track, TrackId};

use super::fsm::ReplayState;
use crate::process::InterestingProcess;

/// Index of a vertex in the event arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

/// State captured immediately before an interaction.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexRecord {
    /// Track that interacted.
    pub emitter: TrackId,
    /// Its species.
    pub emitter_particle: ParticleKind,
    /// Process class.
    pub class: InterestingProcess,
    /// Native process name.
    pub process: String,
    /// Pre-interaction kinematics.
    pub snapshot: Kinematics,
    /// Pre-interaction weight.
    pub weight: f64,
    /// Volume the interaction happened in.
    pub volume: Option<String>,
    /// Replay level of the emitter.
    pub level: u32,
    /// Set once the vertex has been replayed.
    pub replayed: bool,
    /// Products of the original interaction.
    pub products: Vec<TrackId>,
    /// Vertex the emitter resolved to when this vertex was recorded.
    pub emitter_origin: Option<VertexId>,
}

impl VertexRecord {
    /// Rebuilds the emitter as it was immediately before the interaction.
    pub fn emitter_track(&self) -> Track {
        let mut track = Track::new(
            self.emitter,
            self.emitter_particle,
            self.snapshot.position,
            self.snapshot.direction,
            self.snapshot.kinetic_energy,
        )
        .with_weight(self.weight);
        track.restore_kinematics(&self.snapshot);
        track.volume = self.volume.clone();
        track
    }
}

/// Per-track lineage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineageEntry {
    /// Replay state.
    pub state: ReplayState,
    /// Most recent vertex this track emitted.
    pub last_vertex: Option<VertexId>,
    /// Vertex that produced this track.
    pub creation_vertex: Option<VertexId>,
    /// Vertex inherited from the parent when the producing interaction was
    /// not recorded.
    pub inherited_from: Option<VertexId>,
    /// Replay level.
    pub level: u32,
    /// Other photon of the same annihilation.
    pub twin: Option<TrackId>,
}

impl LineageEntry {
    fn forget_vertices(&mut self) {
        self.last_vertex = None;
        self.creation_vertex = None;
        self.inherited_from = None;
    }
}

#[derive(Clone, Debug)]
struct PendingVertex {
    process: String,
    class: InterestingProcess,
    particle: ParticleKind,
    snapshot: Kinematics,
    weight: f64,
    volume: Option<String>,
}

/// Vertex arena and lineage table of one event.
#[derive(Clone, Debug, Default)]
pub struct VertexRecorder {
    vertices: Vec<VertexRecord>,
    entries: HashMap<TrackId, LineageEntry>,
    pending: HashMap<TrackId, PendingVertex>,
}

impl VertexRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards every vertex and lineage entry.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.entries.clear();
        self.pending.clear();
    }

    /// Lineage of `id`.
    #[inline]
    pub fn entry(&self, id: TrackId) -> Option<&LineageEntry> {
        self.entries.get(&id)
    }

    /// Lineage of `id`, created `Pending` if absent.
    pub fn entry_mut(&mut self, id: TrackId) -> &mut LineageEntry {
        self.entries.entry(id).or_default()
    }

    /// Replay state of `id` (`Pending` if unknown).
    #[inline]
    pub fn state(&self, id: TrackId) -> ReplayState {
        self.entries.get(&id).map_or(ReplayState::Pending, |e| e.state)
    }

    /// Vertex `id`.
    #[inline]
    pub fn vertex(&self, id: VertexId) -> Option<&VertexRecord> {
        self.vertices.get(id.0)
    }

    /// Number of recorded vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Forgets the vertices `id` knew about; called when the track
    /// (re-)enters the region.
    pub fn reset_lineage(&mut self, id: TrackId) {
        self.entry_mut(id).forget_vertices();
    }

    /// Remembers the state of `track` ahead of an interaction of `process`.
    pub fn stash(&mut self, track: &Track, process: &str, class: InterestingProcess) {
        self.pending.insert(
            track.id,
            PendingVertex {
                process: process.to_string(),
                class,
                particle: track.particle,
                snapshot: track.kinematics(),
                weight: track.weight,
                volume: track.volume.clone(),
            },
        );
    }

    /// Turns the stashed snapshot of `emitter` into a vertex if `process`
    /// is the interaction that was stashed, and links `products` to it.
    ///
    /// Products of any other interaction inherit the emitter's resolved
    /// vertex. Returns the new vertex, if one was recorded.
    pub fn commit(
        &mut self,
        emitter: TrackId,
        process: Option<&str>,
        products: &[TrackId],
    ) -> Option<VertexId> {
        let pending = self.pending.remove(&emitter);
        let level = self.entry_mut(emitter).level;

        let recorded = match (pending, process) {
            (Some(pending), Some(process)) if pending.process == process => {
                let origin = self.resolve(emitter);
                let id = VertexId(self.vertices.len());
                self.vertices.push(VertexRecord {
                    emitter,
                    emitter_particle: pending.particle,
                    class: pending.class,
                    process: pending.process,
                    snapshot: pending.snapshot,
                    weight: pending.weight,
                    volume: pending.volume,
                    level,
                    replayed: false,
                    products: products.to_vec(),
                    emitter_origin: origin,
                });
                self.entry_mut(emitter).last_vertex = Some(id);
                Some(id)
            }
            _ => None,
        };

        let inherited = match recorded {
            Some(_) => None,
            None => self.resolve(emitter),
        };
        for &product in products {
            let entry = self.entry_mut(product);
            entry.level = level;
            entry.creation_vertex = recorded;
            entry.inherited_from = inherited;
        }
        recorded
    }

    /// Links the products of a replay of `vertex`, one level deeper.
    pub fn adopt_replay_products(&mut self, vertex: VertexId, products: &[TrackId]) {
        let level = self.vertex(vertex).map_or(0, |v| v.level) + 1;
        for &product in products {
            let entry = self.entry_mut(product);
            *entry = LineageEntry {
                creation_vertex: Some(vertex),
                level,
                ..LineageEntry::default()
            };
        }
    }

    /// Pairs two annihilation photons.
    pub fn pair_twins(&mut self, first: TrackId, second: TrackId) {
        self.entry_mut(first).twin = Some(second);
        self.entry_mut(second).twin = Some(first);
    }

    /// Vertex to replay when `id` leaves the region.
    ///
    /// Looks at the track's own last vertex, then the vertex that created
    /// it, then the vertex it inherited. A photon created by positron
    /// bremsstrahlung resolves to the vertex the positron itself resolved
    /// to, so that the pair conversion is replayed rather than the
    /// radiation.
    pub fn resolve(&self, id: TrackId) -> Option<VertexId> {
        let entry = self.entries.get(&id)?;
        if let Some(vertex) = entry.last_vertex {
            return Some(vertex);
        }
        if let Some(created) = entry.creation_vertex {
            let record = self.vertex(created)?;
            if record.class == InterestingProcess::Bremsstrahlung
                && record.emitter_particle == ParticleKind::Positron
            {
                if let Some(origin) = record.emitter_origin {
                    return Some(origin);
                }
            }
            return Some(created);
        }
        entry.inherited_from
    }

    /// Marks `vertex` replayed.
    pub fn mark_replayed(&mut self, vertex: VertexId) {
        if let Some(record) = self.vertices.get_mut(vertex.0) {
            record.replayed = true;
        }
    }

    /// Products of `vertex` other than `except` that have not finished.
    pub fn unfinished_siblings(&self, vertex: VertexId, except: TrackId) -> Vec<TrackId> {
        self.vertex(vertex)
            .map(|record| {
                record
                    .products
                    .iter()
                    .copied()
                    .filter(|&id| id != except && !self.state(id).is_finished())
                    .collect()
            })
            .unwrap_or_default()
    }
}
