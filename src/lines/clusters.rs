use super::cluster::{ClusterId, LineCluster};
use super::comb::{Comb, CombId};
use super::options::ClusterParams;
use crate::filament::{FilamentArena, FilamentId};
use crate::scale::InterlineScale;
use crate::skew::Skew;
use crate::types::Rect;
use log::debug;
use nalgebra::Point2;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Result of one clustering pass.
#[derive(Clone, Debug, Default)]
pub struct ClustersOutcome {
    /// Surviving clusters, sorted by de-skewed ordinate.
    pub clusters: Vec<LineCluster>,
    /// Root filaments that ended up in no cluster.
    pub discarded: Vec<FilamentId>,
    /// Combs detected by the sampling phase.
    pub comb_count: usize,
}

/// Gathers filaments into clusters of regularly spaced lines.
///
/// The pass runs in a fixed order:
/// - sample vertical columns and detect combs of interline-spaced filaments,
/// - unify filaments found at the same relative line in different combs,
/// - seed clusters from combs then expand, merge, trim and filter them,
/// - optionally recover one-line clusters from the leftovers.
pub(crate) struct ClustersRetriever<'a> {
    arena: &'a mut FilamentArena,
    skew: Skew,
    params: ClusterParams,
    interline: InterlineScale,
    sheet_width: i32,
    max_fore: i32,
    comb_sizes: BTreeSet<usize>,
    check_consistency: bool,
    filaments: Vec<FilamentId>,
    discarded: Vec<FilamentId>,
    combs: Vec<Comb>,
    processed: Vec<bool>,
    /// Combs each filament appears in, keyed by sampling column.
    fil_combs: HashMap<FilamentId, BTreeMap<usize, CombId>>,
    /// Cluster and line position a filament was assigned to.
    memberships: HashMap<FilamentId, (ClusterId, i32)>,
    clusters: Vec<LineCluster>,
    live: Vec<ClusterId>,
}

impl<'a> ClustersRetriever<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arena: &'a mut FilamentArena,
        filaments: Vec<FilamentId>,
        skew: Skew,
        params: ClusterParams,
        interline: InterlineScale,
        sheet_width: i32,
        max_fore: i32,
        comb_sizes: BTreeSet<usize>,
        check_consistency: bool,
    ) -> Self {
        Self {
            arena,
            skew,
            params,
            interline,
            sheet_width,
            max_fore,
            comb_sizes,
            check_consistency,
            filaments,
            discarded: Vec::new(),
            combs: Vec::new(),
            processed: Vec::new(),
            fil_combs: HashMap::new(),
            memberships: HashMap::new(),
            clusters: Vec::new(),
            live: Vec::new(),
        }
    }

    pub fn retrieve(mut self) -> ClustersOutcome {
        self.retrieve_combs();
        self.follow_combs_network();
        self.retrieve_clusters();
        debug!(
            "clusters: {} clusters of sizes {:?} for interline {}, {} discarded filaments",
            self.live.len(),
            self.comb_sizes,
            self.interline.main,
            self.discarded.len()
        );

        let clusters = self
            .live
            .iter()
            .map(|&cid| self.clusters[cid.index()].clone())
            .collect();
        ClustersOutcome {
            clusters,
            discarded: self.discarded,
            comb_count: self.combs.len(),
        }
    }

    // ----------------------------------------------------------------- combs

    fn retrieve_combs(&mut self) {
        let d_min = self.interline.min - self.params.comb_min_margin;
        let d_max = self.interline.max + self.params.comb_max_margin;
        let width = self.sheet_width as f64;
        let sample_count =
            ((width / self.params.sampling_dx as f64).round() as i64 - 1).max(0) as usize;
        let sampling_dx = width / (sample_count + 1) as f64;

        for col in 1..=sample_count {
            let x = (sampling_dx * col as f64).round() as i32;
            let fils = self.filaments_at(x as f64);
            let mut current: Option<usize> = None;
            let mut prev: Option<(FilamentId, f64)> = None;
            for (fil, y) in fils {
                if let Some((prev_fil, prev_y)) = prev {
                    let dy = (y - prev_y).round() as i32;
                    if dy >= d_min && dy <= d_max {
                        let index = match current {
                            Some(index) => index,
                            None => {
                                let id = CombId(self.combs.len() as u32);
                                let mut comb = Comb::new(id, col, x);
                                comb.append(prev_fil, prev_y);
                                self.register(prev_fil, col, id);
                                self.combs.push(comb);
                                self.combs.len() - 1
                            }
                        };
                        let id = self.combs[index].id;
                        self.combs[index].append(fil, y);
                        self.register(fil, col, id);
                        current = Some(index);
                    } else {
                        current = None;
                    }
                }
                prev = Some((fil, y));
            }
        }
        self.processed = vec![false; self.combs.len()];
        debug!("clusters: {} combs over {} columns", self.combs.len(), sample_count);
    }

    fn register(&mut self, fil: FilamentId, col: usize, comb: CombId) {
        self.fil_combs.entry(fil).or_default().insert(col, comb);
    }

    fn filaments_at(&self, x: f64) -> Vec<(FilamentId, f64)> {
        let mut list: Vec<(FilamentId, f64)> = self
            .filaments
            .iter()
            .map(|&id| self.arena.get(id))
            .filter(|f| x >= f.start_coord() as f64 && x <= f.stop_coord() as f64)
            .map(|f| (f.id, f.y_at(x)))
            .collect();
        list.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        list
    }

    fn combs_of(&self, fil: FilamentId) -> Vec<CombId> {
        self.fil_combs
            .get(&fil)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default()
    }

    /// Unify the filaments seen at the same relative line from a pivot.
    fn follow_combs_network(&mut self) {
        for fil in self.filaments.clone() {
            let mut lines: BTreeMap<i32, FilamentId> = BTreeMap::new();
            for cid in self.combs_of(fil) {
                let comb = &self.combs[cid.index()];
                let Some(pivot) = comb.index_of(self.arena, fil) else {
                    continue;
                };
                let members: Vec<FilamentId> = comb.filaments().to_vec();
                for (pos, other) in members.into_iter().enumerate() {
                    let line = pos as i32 - pivot as i32;
                    if line == 0 {
                        continue;
                    }
                    match lines.get(&line) {
                        Some(&known) => self.connect_ancestors(known, other),
                        None => {
                            lines.insert(line, other);
                        }
                    }
                }
            }
        }
        self.remove_merged_filaments();
    }

    fn connect_ancestors(&mut self, one: FilamentId, two: FilamentId) {
        let one = self.arena.find(one);
        let two = self.arena.find(two);
        if one == two {
            return;
        }
        let (host, guest) = if self.arena.get(one).length() >= self.arena.get(two).length() {
            (one, two)
        } else {
            (two, one)
        };
        self.arena.include(host, guest);
        if let Some(guest_combs) = self.fil_combs.get(&guest).cloned() {
            self.fil_combs.entry(host).or_default().extend(guest_combs);
        }
    }

    fn remove_merged_filaments(&mut self) {
        let arena = &*self.arena;
        self.filaments.retain(|&f| arena.is_root(f));
    }

    // -------------------------------------------------------------- clusters

    fn retrieve_clusters(&mut self) {
        let mut all = self.filaments.clone();
        self.live = self.create_clusters(&mut all, false);
        self.filaments = all;

        let filaments = self.filaments.clone();
        let live = std::mem::take(&mut self.live);
        self.live = self.expand_clusters(live, &filaments);
        let live = std::mem::take(&mut self.live);
        self.live = self.merge_clusters(live);
        self.remove_merged_filaments();
        self.trim_clusters();
        self.destroy_non_desired();
        self.merge_cluster_pairs();
        if self.check_consistency {
            self.destroy_inconsistent();
        }
        let filaments = self.filaments.clone();
        let live = std::mem::take(&mut self.live);
        self.live = self.expand_clusters(live, &filaments);
        self.discard_non_clustered();

        if self.comb_sizes.contains(&1) {
            let singles = self.retrieve_one_line_clusters();
            self.live.extend(singles);
            self.sort_by_ordinate_live();
        }
        self.remove_merged_filaments();
    }

    fn cluster_of(&self, fil: FilamentId) -> Option<(ClusterId, i32)> {
        self.memberships.get(&fil).copied()
    }

    fn cluster_ancestor(&self, mut cid: ClusterId) -> ClusterId {
        while let Some(parent) = self.clusters[cid.index()].parent {
            cid = parent;
        }
        cid
    }

    fn create_clusters(&mut self, filaments: &mut [FilamentId], single: bool) -> Vec<ClusterId> {
        let arena = &*self.arena;
        filaments.sort_by(|a, b| arena.get(*b).length().cmp(&arena.get(*a).length()));

        let mut created = Vec::new();
        for &fil in filaments.iter() {
            let fil = self.arena.ancestor(fil);
            let has_combs = self.fil_combs.get(&fil).is_some_and(|m| !m.is_empty());
            if self.cluster_of(fil).is_none() && (single || has_combs) {
                let cid = ClusterId(self.clusters.len() as u32);
                self.clusters.push(LineCluster::new(cid, fil));
                self.include_pivot(cid, fil, 0);
                created.push(cid);
            }
        }
        self.remove_merged_clusters(created)
    }

    fn remove_merged_clusters(&self, mut list: Vec<ClusterId>) -> Vec<ClusterId> {
        list.retain(|cid| self.clusters[cid.index()].parent.is_none());
        list
    }

    /// Grow cluster `cid` from `pivot` at `pivot_pos`, following every comb
    /// not yet processed.
    fn include_pivot(&mut self, cid: ClusterId, pivot: FilamentId, pivot_pos: i32) {
        let ancestor = self.arena.ancestor(pivot);
        let combs = self.combs_of(pivot);
        if combs.is_empty() {
            self.put_line(cid, pivot_pos, pivot);
            return;
        }

        for comb_id in combs {
            if self.processed[comb_id.index()] {
                continue;
            }
            self.processed[comb_id.index()] = true;
            let comb = &self.combs[comb_id.index()];
            let Some(index) = comb.index_of(self.arena, pivot) else {
                continue;
            };
            let delta = pivot_pos - index as i32;
            let members: Vec<FilamentId> = comb.filaments().to_vec();

            for (i, member) in members.into_iter().enumerate() {
                let fil = self.arena.ancestor(member);
                let pos = i as i32 + delta;
                match self.cluster_of(fil) {
                    None => {
                        self.put_line(cid, pos, fil);
                        if fil != ancestor {
                            self.include_pivot(cid, fil, pos);
                        }
                    }
                    Some((other, other_pos)) => {
                        let other = self.cluster_ancestor(other);
                        if other != self.cluster_ancestor(cid) {
                            self.include_cluster(cid, other, pos - other_pos);
                        }
                    }
                }
            }
        }
    }

    /// Set `fil` as line `pos` of the cluster, or merge it into the line
    /// already there.
    fn put_line(&mut self, cid: ClusterId, pos: i32, fil: FilamentId) {
        match self.clusters[cid.index()].lines.get(&pos).copied() {
            Some(line) => {
                self.arena.include(line, fil);
            }
            None => {
                self.clusters[cid.index()].lines.insert(pos, fil);
            }
        }
        self.memberships.insert(fil, (cid, pos));
        self.clusters[cid.index()].invalidate();
    }

    /// Move all lines of `that` into `this`, shifting positions by `delta`.
    fn include_cluster(&mut self, this: ClusterId, that: ClusterId, delta: i32) {
        if this == that {
            return;
        }
        let lines: Vec<(i32, FilamentId)> = self.clusters[that.index()].entries().collect();
        for (pos, that_line) in lines {
            let this_pos = pos + delta;
            match self.clusters[this.index()].lines.get(&this_pos).copied() {
                Some(this_line) => {
                    self.arena.include(this_line, that_line);
                }
                None => {
                    self.clusters[this.index()].lines.insert(this_pos, that_line);
                    self.memberships.insert(that_line, (this, this_pos));
                }
            }
        }
        self.clusters[that.index()].parent = Some(this);
        self.clusters[this.index()].invalidate();
    }

    fn merge_with(&mut self, this: ClusterId, that: ClusterId, delta: i32) {
        let shift = self.clusters[this.index()].first_pos() - self.clusters[that.index()].first_pos();
        self.include_cluster(this, that, delta + shift);
    }

    /// Forget cluster membership and combs of every line of the cluster.
    fn destroy(&mut self, cid: ClusterId) {
        let lines: Vec<FilamentId> = self.clusters[cid.index()].lines().collect();
        for line in lines {
            self.release(line);
        }
    }

    fn release(&mut self, line: FilamentId) {
        self.memberships.remove(&line);
        self.fil_combs.remove(&line);
    }

    fn refresh_memberships(&mut self, cid: ClusterId) {
        let entries: Vec<(i32, FilamentId)> = self.clusters[cid.index()].entries().collect();
        for (pos, fil) in entries {
            self.memberships.insert(fil, (cid, pos));
        }
    }

    // ------------------------------------------------------------- expansion

    fn expand_clusters(&mut self, mut clusters: Vec<ClusterId>, filaments: &[FilamentId]) -> Vec<ClusterId> {
        let arena = &*self.arena;
        let mut start_fils = filaments.to_vec();
        start_fils.sort_by(|a, b| {
            arena.get(*a).start_point().x
                .partial_cmp(&arena.get(*b).start_point().x)
                .unwrap_or(Ordering::Equal)
        });
        let mut stop_fils = start_fils.clone();
        stop_fils.sort_by(|a, b| {
            arena.get(*a).stop_point().x
                .partial_cmp(&arena.get(*b).stop_point().x)
                .unwrap_or(Ordering::Equal)
        });
        clusters.sort_by(|a, b| {
            let la = self.clusters[a.index()].true_length(arena);
            let lb = self.clusters[b.index()].true_length(arena);
            lb.cmp(&la)
        });

        for &cid in &clusters {
            self.expand_cluster(cid, &stop_fils);
            self.expand_cluster(cid, &start_fils);
        }
        clusters
    }

    fn expand_cluster(&mut self, cid: ClusterId, fils: &[FilamentId]) {
        let slope = self.skew.slope();
        let mut cluster_box: Option<Rect> = None;

        for &fil in fils {
            let fil = self.arena.ancestor(fil);
            if self.cluster_of(fil).is_some() {
                continue;
            }
            let bx = *cluster_box.get_or_insert_with(|| {
                self.clusters[cid.index()]
                    .bounds(self.arena)
                    .grow(self.params.max_merge_dx, self.params.cluster_y_margin)
            });
            let fil_box = self.arena.get(fil).bounds();
            let mid_x = fil_box.x + fil_box.width / 2;
            let mid_y = self.arena.get(fil).y_at(mid_x as f64).round() as i32;
            if !bx.contains(mid_x, mid_y) {
                continue;
            }

            let points = self.clusters[cid.index()].points_at(
                self.arena,
                mid_x as f64,
                self.params.max_expand_dx,
                slope,
            );
            for (index, point) in points.iter().enumerate() {
                let Some(point) = point else {
                    continue;
                };
                let dy = (mid_y as f64 - point.y).abs();
                if dy <= self.params.max_expand_dy as f64 && self.include_by_index(cid, fil, index) {
                    cluster_box = None;
                    break;
                }
            }
        }
    }

    /// Merge `fil` into the cluster line at `index`, unless the resulting
    /// compound gets thicker than a staff line.
    fn include_by_index(&mut self, cid: ClusterId, fil: FilamentId, index: usize) -> bool {
        let Some((pos, line)) = self.clusters[cid.index()].entries().nth(index) else {
            return false;
        };
        let fil_box = self.arena.get(fil).bounds();
        for section in self.arena.resolved(line).sections() {
            let sct_box = section.bounds();
            let overlap = fil_box.x_overlap(&sct_box);
            if overlap > 0 {
                let x = fil_box.x.max(sct_box.x) + overlap / 2;
                if self.arena.thickness_at(x, &[fil, line]) > self.max_fore {
                    return false;
                }
            }
        }
        self.arena.include(line, fil);
        self.memberships.insert(fil, (cid, pos));
        self.clusters[cid.index()].invalidate();
        true
    }

    // --------------------------------------------------------------- merging

    fn ordinate_of(&self, point: Point2<f64>) -> f64 {
        self.skew.deskewed(point.x, point.y).y
    }

    fn cluster_ordinate(&self, cid: ClusterId) -> f64 {
        self.ordinate_of(self.clusters[cid.index()].center(self.arena))
    }

    fn sort_by_ordinate(&self, list: &mut [ClusterId]) {
        list.sort_by(|a, b| {
            self.cluster_ordinate(*a)
                .partial_cmp(&self.cluster_ordinate(*b))
                .unwrap_or(Ordering::Equal)
        });
    }

    fn sort_by_ordinate_live(&mut self) {
        let mut live = std::mem::take(&mut self.live);
        self.sort_by_ordinate(&mut live);
        self.live = live;
    }

    fn ordinates_of(&self, points: &[Option<Point2<f64>>]) -> Vec<Option<f64>> {
        points.iter().map(|p| p.map(|p| self.ordinate_of(p))).collect()
    }

    /// Every cluster absorbs the compatible clusters located above it.
    fn merge_clusters(&mut self, mut clusters: Vec<ClusterId>) -> Vec<ClusterId> {
        self.sort_by_ordinate(&mut clusters);

        for (ci, &current) in clusters.iter().enumerate() {
            let max_merge_dx = if self.clusters[current.index()].is_one_line() {
                self.sheet_width
            } else {
                self.params.max_merge_dx
            };
            'candidate: loop {
                let candidate_box = self.clusters[current.index()]
                    .bounds(self.arena)
                    .grow(max_merge_dx, self.params.cluster_y_margin);
                for &head in &clusters[..ci] {
                    if self.clusters[head.index()].parent.is_some() {
                        continue;
                    }
                    if !self.clusters[head.index()].bounds(self.arena).intersects(&candidate_box) {
                        continue;
                    }
                    if let Some(delta) = self.can_merge(head, current) {
                        debug!("clusters: merging #{} into #{} delta {}", head.0, current.0, delta);
                        self.merge_with(current, head, delta);
                        continue 'candidate;
                    }
                }
                break;
            }
        }

        self.remove_merged_clusters(clusters)
    }

    /// Best line offset to merge `two` with `one`, if compatible.
    fn can_merge(&self, one: ClusterId, two: ClusterId) -> Option<i32> {
        let c1 = &self.clusters[one.index()];
        let c2 = &self.clusters[two.index()];
        let one_box = c1.bounds(self.arena);
        let two_box = c2.bounds(self.arena);
        let (one_left, one_right) = (one_box.x, one_box.right());
        let (two_left, two_right) = (two_box.x, two_box.right());
        let max_dy = self.params.max_merge_dy as f64;

        if c1.size() > 1 || c2.size() > 1 {
            let min_right = one_right.min(two_right);
            let max_left = one_left.max(two_left);
            let gap = max_left - min_right;
            if gap > self.params.max_merge_dx {
                return None;
            }
            if gap <= 0 {
                let x_mid = ((max_left + min_right) / 2) as f64;
                let slope = self.skew.slope();
                let margin = self.params.max_extrapolation_dx;
                let (dist, delta) = best_match(
                    &self.ordinates_of(&c1.points_at(self.arena, x_mid, margin, slope)),
                    &self.ordinates_of(&c2.points_at(self.arena, x_mid, margin, slope)),
                );
                let delta = delta?;
                return (dist <= max_dy && self.check_collision(one, two, delta)).then_some(delta);
            }
        }

        let (dist, delta) = if one_left < two_left {
            best_match(
                &self.ordinates_of(&c1.stops(self.arena)),
                &self.ordinates_of(&c2.starts(self.arena)),
            )
        } else {
            best_match(
                &self.ordinates_of(&c1.starts(self.arena)),
                &self.ordinates_of(&c2.stops(self.arena)),
            )
        };
        let delta = delta?;
        (dist <= max_dy).then_some(delta)
    }

    /// True when no pair of matched lines would form too thick a compound.
    fn check_collision(&self, one: ClusterId, two: ClusterId, delta: i32) -> bool {
        let one_lines: Vec<FilamentId> = self.clusters[one.index()].lines().collect();
        let two_lines: Vec<FilamentId> = self.clusters[two.index()].lines().collect();
        for (i1, &f1) in one_lines.iter().enumerate() {
            let i2 = i1 as i32 + delta;
            if i2 < 0 || i2 as usize >= two_lines.len() {
                continue;
            }
            let f2 = two_lines[i2 as usize];
            let r1 = self.arena.resolved(f1).bounds();
            let r2 = self.arena.resolved(f2).bounds();
            let overlap = r1.x_overlap(&r2);
            if overlap >= 0 {
                let mid = r1.x.max(r2.x) + overlap / 2;
                if self.arena.thickness_at(mid, &[f1, f2]) > self.max_fore {
                    return false;
                }
            }
        }
        true
    }

    // --------------------------------------------------------------- pruning

    fn trim_clusters(&mut self) {
        let mut live = std::mem::take(&mut self.live);
        self.sort_by_ordinate(&mut live);
        let max_count = self.comb_sizes.last().copied().unwrap_or(5);
        let ratio = self.params.min_cluster_tablature_length_ratio;
        for &cid in &live {
            let removed = self.clusters[cid.index()].trim(self.arena, max_count, ratio);
            for line in removed {
                self.release(line);
            }
            self.refresh_memberships(cid);
        }
        self.live = live;
    }

    fn destroy_non_desired(&mut self) {
        let live = std::mem::take(&mut self.live);
        let mut kept = Vec::with_capacity(live.len());
        for cid in live {
            if self.comb_sizes.contains(&self.clusters[cid.index()].size()) {
                kept.push(cid);
            } else {
                debug!("clusters: destroying #{} of size {}", cid.0, self.clusters[cid.index()].size());
                self.destroy(cid);
            }
        }
        self.live = kept;
    }

    fn acceptable_length(&self) -> f64 {
        let mut lengths: Vec<i32> = self
            .live
            .iter()
            .map(|cid| self.clusters[cid.index()].true_length(self.arena))
            .collect();
        lengths.sort_unstable();
        lengths
            .get(lengths.len() / 2)
            .map_or(0.0, |&median| median as f64 * self.params.min_cluster_length_ratio)
    }

    /// Merge same-size clusters lying side by side at the same ordinate and
    /// drop clusters much shorter than the median.
    ///
    /// Dropped short clusters keep their filaments out of the discarded set.
    fn merge_cluster_pairs(&mut self) {
        if self.live.is_empty() {
            return;
        }
        let mut clusters = std::mem::take(&mut self.live);
        self.sort_by_ordinate(&mut clusters);
        self.live = clusters.clone();
        let min_length = self.acceptable_length();

        let mut idx = 0;
        'whole: while idx < clusters.len() {
            let cid = clusters[idx];
            let cluster_box = self.clusters[cid.index()].bounds(self.arena);
            let y_max = self.cluster_ordinate(cid) + self.params.max_merge_center_dy as f64;
            let size = self.clusters[cid.index()].size();

            for j in idx + 1..clusters.len() {
                let cl = clusters[j];
                if self.clusters[cl.index()].size() != size {
                    continue;
                }
                if self.cluster_ordinate(cl) > y_max {
                    break;
                }
                let cl_box = self.clusters[cl.index()].bounds(self.arena);
                if cluster_box.x_gap(&cl_box) > self.params.max_merge_dx {
                    continue;
                }
                self.merge_with(cid, cl, 0);
                clusters.remove(j);
                continue 'whole;
            }

            if (self.clusters[cid.index()].true_length(self.arena) as f64) < min_length {
                debug!("clusters: dropping short #{}", cid.0);
                clusters.remove(idx);
            } else {
                idx += 1;
            }
        }

        self.live = clusters;
        self.remove_merged_filaments();
    }

    fn is_consistent(&self, cid: ClusterId) -> bool {
        let lengths: Vec<i32> = self.clusters[cid.index()]
            .lines()
            .map(|f| self.arena.resolved(f).length())
            .collect();
        let (Some(&min), Some(&max)) = (lengths.iter().min(), lengths.iter().max()) else {
            return false;
        };
        let mean = (min + max) as f64 / 2.0;
        (max - min) as f64 / mean <= self.params.max_cluster_diff_length_ratio
    }

    fn destroy_inconsistent(&mut self) {
        let live = std::mem::take(&mut self.live);
        let mut kept = Vec::with_capacity(live.len());
        for cid in live {
            if self.is_consistent(cid) {
                kept.push(cid);
            } else {
                debug!("clusters: destroying inconsistent #{}", cid.0);
                self.destroy(cid);
            }
        }
        self.live = kept;
    }

    fn discard_non_clustered(&mut self) {
        let fils = std::mem::take(&mut self.filaments);
        for fil in fils {
            if !self.arena.is_root(fil) || self.cluster_of(fil).is_some() {
                self.filaments.push(fil);
            } else {
                self.discarded.push(fil);
            }
        }
    }

    // ------------------------------------------------------------- one-line

    /// Build one-line clusters out of discarded filaments, away from any
    /// standard cluster.
    fn retrieve_one_line_clusters(&mut self) -> Vec<ClusterId> {
        if self.discarded.is_empty() {
            return Vec::new();
        }
        let mut discarded = std::mem::take(&mut self.discarded);
        let singles = self.create_clusters(&mut discarded, true);
        let singles = self.expand_clusters(singles, &discarded);
        let singles = self.merge_clusters(singles);
        discarded.retain(|&f| self.arena.is_root(f));
        self.sort_by_ordinate_live();

        let margin = self.params.cluster_y_margin;
        let live = self.live.clone();
        let mut kept = Vec::with_capacity(singles.len());
        'singles: for sid in singles {
            let single = &self.clusters[sid.index()];
            let center = single.center(self.arena);
            let s_pt = self.skew.deskewed(center.x, center.y);
            let s_box = single.bounds(self.arena).grow(0, margin);

            for &cid in &live {
                let cl = &self.clusters[cid.index()];
                if !cl.bounds(self.arena).intersects(&s_box) {
                    continue;
                }
                let (Some(first), Some(last)) = (cl.first_line(), cl.last_line()) else {
                    continue;
                };
                let y1 = self.arena.resolved(first).y_at(s_pt.x) - margin as f64;
                if s_pt.y < self.skew.deskewed(s_pt.x, y1).y {
                    break;
                }
                let y2 = self.arena.resolved(last).y_at(s_pt.x) + margin as f64;
                if s_pt.y > self.skew.deskewed(s_pt.x, y2).y {
                    continue;
                }
                debug!("clusters: one-line #{} too close to #{}", sid.0, cid.0);
                self.destroy(sid);
                continue 'singles;
            }
            kept.push(sid);
        }

        let claimed: BTreeSet<FilamentId> = kept
            .iter()
            .flat_map(|sid| self.clusters[sid.index()].lines())
            .collect();
        discarded.retain(|f| !claimed.contains(f));
        self.discarded = discarded;
        kept
    }
}

/// Best integer shift between two ordinate sequences.
///
/// Returns the mean absolute ordinate difference of the best shift and the
/// shift itself (index in `two` = index in `one` + shift), `None` when no
/// shift pairs two known ordinates.
pub(crate) fn best_match(one: &[Option<f64>], two: &[Option<f64>]) -> (f64, Option<i32>) {
    let delta_max = one.len().max(two.len()) as i32 - 1;
    let mut best = (f64::MAX, None);
    for delta in -delta_max..=delta_max {
        let mut sum = 0.0;
        let mut count = 0;
        for (i, a) in one.iter().enumerate() {
            let j = i as i32 + delta;
            if j < 0 || j as usize >= two.len() {
                continue;
            }
            if let (Some(a), Some(b)) = (a, two[j as usize]) {
                sum += (b - a).abs();
                count += 1;
            }
        }
        if count > 0 {
            let dist = sum / count as f64;
            if dist < best.0 {
                best = (dist, Some(delta));
            }
        }
    }
    best
}
