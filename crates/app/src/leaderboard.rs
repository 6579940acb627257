//! The live leaderboard: a ranked aggregation view.
//!
//! [`Standings`] is the pure part: a snapshot of the house collection
//! kept strictly ordered (points descending, house id ascending on
//! ties) with no duplicate ids. [`LeaderboardView`] wraps it with the
//! realtime plumbing: an initial full load, exactly one change-feed
//! subscription, and an apply task that merges incoming patches and
//! re-sorts. The collection is small (four houses), so a full
//! merge-then-resort per patch is the whole algorithm.
//!
//! Patches carry no sequence numbers, so a patch delivered out of
//! order can be a stale overwrite. Acceptable for a leaderboard
//! display; not a consistency mechanism.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use houseboard_core::House;
use houseboard_gateway::{ChangeEvent, ChangeFilter, ChangeKind, ChangeTable, Gateway,
                         GatewayError, Subscription};

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// An ordered snapshot of the house collection.
#[derive(Debug, Clone, Default)]
pub struct Standings {
    houses: Vec<House>,
}

impl Standings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole snapshot and re-sort.
    ///
    /// Duplicate ids in the input collapse to the last occurrence, so
    /// the no-duplicate invariant holds whatever the fetch returned.
    pub fn replace_all(&mut self, houses: Vec<House>) {
        let mut deduped: Vec<House> = Vec::with_capacity(houses.len());
        for house in houses {
            if let Some(existing) = deduped.iter_mut().find(|h| h.id == house.id) {
                *existing = house;
            } else {
                deduped.push(house);
            }
        }
        self.houses = deduped;
        self.sort();
    }

    /// Merge a partial update into the matching entry and re-sort.
    ///
    /// A patch for an unknown id is dropped (the feed can race a
    /// snapshot that has not seen the row yet); last patch wins
    /// field-by-field. Returns whether anything was applied.
    pub fn apply_patch(&mut self, patch: &HousePatch) -> bool {
        let Some(house) = self.houses.iter_mut().find(|h| h.id == patch.id) else {
            tracing::debug!(house_id = %patch.id, "Dropping patch for unknown house");
            return false;
        };
        if let Some(name) = &patch.name {
            house.name = name.clone();
        }
        if let Some(points) = patch.points {
            house.points = points;
        }
        self.sort();
        true
    }

    /// Highest point total in the snapshot, floored at 1 so it can be
    /// used as a proportional-bar divisor even when all totals are 0.
    pub fn max_points(&self) -> i64 {
        self.houses.iter().map(|h| h.points).max().unwrap_or(0).max(1)
    }

    /// Houses in display order.
    pub fn houses(&self) -> &[House] {
        &self.houses
    }

    pub fn len(&self) -> usize {
        self.houses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.houses.is_empty()
    }

    fn sort(&mut self) {
        self.houses
            .sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.id.cmp(&b.id)));
    }
}

// ---------------------------------------------------------------------------
// HousePatch
// ---------------------------------------------------------------------------

/// A partial update to one house, as carried by a change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HousePatch {
    pub id: String,
    pub name: Option<String>,
    pub points: Option<i64>,
}

impl HousePatch {
    /// Extract a patch from a change event's `record`.
    ///
    /// Returns `None` for records without a usable id; the caller
    /// drops those with a warning rather than faulting the view.
    pub fn from_change(event: &ChangeEvent) -> Option<Self> {
        let record = event.record.as_object()?;
        let id = record.get("id")?.as_str()?.to_string();
        Some(Self {
            id,
            name: record.get("name").and_then(|v| v.as_str()).map(str::to_string),
            points: record.get("points").and_then(|v| v.as_i64()),
        })
    }
}

// ---------------------------------------------------------------------------
// LeaderboardView
// ---------------------------------------------------------------------------

/// A mounted leaderboard: snapshot plus live feed.
///
/// Holds exactly one change-feed subscription for its lifetime. The
/// subscription is acquired in [`start`](Self::start) and released on
/// every exit path of the apply task; [`close`](Self::close) (also on
/// drop) cancels the task, after which any further delivery or an
/// in-flight [`reload`](Self::reload) resolving late is a no-op.
pub struct LeaderboardView {
    gateway: Arc<dyn Gateway>,
    standings_tx: Arc<watch::Sender<Standings>>,
    cancel: CancellationToken,
}

impl LeaderboardView {
    /// Load the initial snapshot and go live.
    ///
    /// A failed initial fetch is terminal for this attempt and is
    /// returned to the caller; no retry is made here.
    pub async fn start(gateway: Arc<dyn Gateway>) -> Result<Self, GatewayError> {
        let houses = gateway.houses().await?;
        let mut initial = Standings::new();
        initial.replace_all(houses);

        let subscription = gateway
            .subscribe(ChangeTable::Houses, ChangeFilter::Only(ChangeKind::Update))
            .await?;

        let (standings_tx, _) = watch::channel(initial);
        let standings_tx = Arc::new(standings_tx);
        let cancel = CancellationToken::new();

        tokio::spawn(apply_changes(
            subscription,
            Arc::clone(&standings_tx),
            cancel.clone(),
        ));

        Ok(Self {
            gateway,
            standings_tx,
            cancel,
        })
    }

    /// Full refetch-and-replace, used by the write-then-refetch
    /// command pattern. Keeps the prior snapshot on failure.
    pub async fn reload(&self) -> Result<(), GatewayError> {
        let houses = self.gateway.houses().await?;
        // The fetch may resolve after teardown; check before mutating.
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        self.standings_tx.send_modify(|s| s.replace_all(houses));
        Ok(())
    }

    /// The current snapshot.
    pub fn standings(&self) -> Standings {
        self.standings_tx.borrow().clone()
    }

    /// Watch the snapshot as it changes.
    pub fn watch(&self) -> watch::Receiver<Standings> {
        self.standings_tx.subscribe()
    }

    /// Tear the view down. Idempotent; also runs on drop.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for LeaderboardView {
    fn drop(&mut self) {
        self.close();
    }
}

/// Apply change-feed patches until the view is torn down.
async fn apply_changes(
    mut subscription: Subscription,
    standings: Arc<watch::Sender<Standings>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = subscription.recv() => {
                let Some(event) = event else { break };
                match HousePatch::from_change(&event) {
                    Some(patch) => {
                        standings.send_modify(|s| {
                            s.apply_patch(&patch);
                        });
                    }
                    None => {
                        tracing::warn!(?event, "Dropped malformed house change event");
                    }
                }
            }
        }
    }
    // Released on every exit path, cancellation included.
    subscription.unsubscribe();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use houseboard_gateway::MemoryGateway;

    fn house(id: &str, points: i64) -> House {
        House {
            id: id.to_string(),
            name: id.to_string(),
            points,
        }
    }

    fn loaded(houses: Vec<House>) -> Standings {
        let mut standings = Standings::new();
        standings.replace_all(houses);
        standings
    }

    fn order(standings: &Standings) -> Vec<&str> {
        standings.houses().iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn load_sorts_descending_by_points() {
        let standings = loaded(vec![house("a", 10), house("b", 30), house("c", 20)]);
        assert_eq!(order(&standings), ["b", "c", "a"]);
    }

    #[test]
    fn ties_break_by_house_id() {
        let standings = loaded(vec![house("d", 20), house("b", 20), house("a", 30)]);
        assert_eq!(order(&standings), ["a", "b", "d"]);
    }

    #[test]
    fn duplicate_ids_collapse_to_the_last_occurrence() {
        let standings = loaded(vec![house("a", 10), house("b", 5), house("a", 40)]);
        assert_eq!(order(&standings), ["a", "b"]);
        assert_eq!(standings.houses()[0].points, 40);
    }

    #[test]
    fn patch_reorders_and_updates_max_points() {
        // houses = [a:50, b:80] -> max 80; after a:90 -> [a, b], max 90.
        let mut standings = loaded(vec![house("a", 50), house("b", 80)]);
        assert_eq!(standings.max_points(), 80);
        assert_eq!(order(&standings), ["b", "a"]);

        let applied = standings.apply_patch(&HousePatch {
            id: "a".to_string(),
            name: None,
            points: Some(90),
        });
        assert!(applied);
        assert_eq!(order(&standings), ["a", "b"]);
        assert_eq!(standings.max_points(), 90);
    }

    #[test]
    fn unknown_id_patch_leaves_snapshot_unchanged() {
        let mut standings = loaded(vec![house("a", 50), house("b", 80)]);
        let before = standings.houses().to_vec();

        let applied = standings.apply_patch(&HousePatch {
            id: "nope".to_string(),
            name: None,
            points: Some(999),
        });

        assert!(!applied);
        assert_eq!(standings.houses(), before.as_slice());
        assert_eq!(standings.len(), 2);
    }

    #[test]
    fn patch_sequences_preserve_order_and_uniqueness() {
        let mut standings = loaded(vec![house("a", 1), house("b", 2), house("c", 3)]);
        let patches = [
            ("a", 10),
            ("c", 4),
            ("b", 10),
            ("a", 2),
            ("zz", 100),
            ("c", 2),
        ];
        for (id, points) in patches {
            standings.apply_patch(&HousePatch {
                id: id.to_string(),
                name: None,
                points: Some(points),
            });

            // Invariant: descending points, unique ids.
            let houses = standings.houses();
            for pair in houses.windows(2) {
                assert!(pair[0].points >= pair[1].points);
            }
            let mut ids: Vec<_> = houses.iter().map(|h| &h.id).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), houses.len());
        }
        assert_eq!(order(&standings), ["b", "a", "c"]);
    }

    #[test]
    fn max_points_floors_at_one() {
        let standings = loaded(vec![house("a", 0), house("b", 0)]);
        assert_eq!(standings.max_points(), 1);
        assert_eq!(Standings::new().max_points(), 1);
    }

    #[test]
    fn patch_parses_from_a_change_record() {
        let event = ChangeEvent {
            table: ChangeTable::Houses,
            kind: ChangeKind::Update,
            record: serde_json::json!({"id": "kotuku", "name": "Kōtuku", "points": 42}),
            old_record: serde_json::Value::Null,
        };
        let patch = HousePatch::from_change(&event).unwrap();
        assert_eq!(patch.id, "kotuku");
        assert_eq!(patch.name.as_deref(), Some("Kōtuku"));
        assert_eq!(patch.points, Some(42));
    }

    #[test]
    fn record_without_id_is_not_a_patch() {
        let event = ChangeEvent {
            table: ChangeTable::Houses,
            kind: ChangeKind::Update,
            record: serde_json::json!({"points": 42}),
            old_record: serde_json::Value::Null,
        };
        assert!(HousePatch::from_change(&event).is_none());

        let empty = ChangeEvent {
            table: ChangeTable::Houses,
            kind: ChangeKind::Update,
            record: serde_json::Value::Null,
            old_record: serde_json::Value::Null,
        };
        assert!(HousePatch::from_change(&empty).is_none());
    }

    // ---- live view ----

    #[tokio::test]
    async fn view_applies_live_updates_in_order() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        let view = LeaderboardView::start(gateway.clone()).await.unwrap();
        let mut watch = view.watch();

        gateway.set_house_points("kotuku", 42).await.unwrap();
        watch.changed().await.unwrap();

        let standings = view.standings();
        assert_eq!(standings.houses()[0].id, "kotuku");
        assert_eq!(standings.houses()[0].points, 42);
        assert_eq!(standings.max_points(), 42);
    }

    #[tokio::test]
    async fn failed_initial_load_is_surfaced_not_retried() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        gateway.fail_next_houses_fetch("relation does not exist");

        let result = LeaderboardView::start(gateway.clone()).await;
        let error = result.err().expect("load failure must surface");
        assert!(error.to_string().contains("relation does not exist"));
    }

    #[tokio::test]
    async fn delivery_after_close_does_not_mutate_state() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        gateway.set_house_points("pukeko", 10).await.unwrap();

        let view = LeaderboardView::start(gateway.clone()).await.unwrap();
        let before = view.standings();
        view.close();
        view.close(); // idempotent

        gateway.set_house_points("pukeko", 999).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let after = view.standings();
        assert_eq!(after.houses(), before.houses());
    }

    #[tokio::test]
    async fn reload_resolving_after_close_is_a_no_op() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        let view = LeaderboardView::start(gateway.clone()).await.unwrap();
        let before = view.standings();

        view.close();
        gateway.set_house_points("keruru", 77).await.unwrap();
        view.reload().await.unwrap();

        assert_eq!(view.standings().houses(), before.houses());
    }

    #[tokio::test]
    async fn malformed_change_events_are_dropped_without_fault() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        let view = LeaderboardView::start(gateway.clone()).await.unwrap();
        let mut watch = view.watch();

        gateway.push_change(ChangeEvent {
            table: ChangeTable::Houses,
            kind: ChangeKind::Update,
            record: serde_json::json!({"points": 12}),
            old_record: serde_json::Value::Null,
        });
        // A good event after the bad one proves the view survived.
        gateway.set_house_points("korimako", 7).await.unwrap();
        watch.changed().await.unwrap();

        let standings = view.standings();
        assert_eq!(standings.houses()[0].id, "korimako");
        assert_eq!(standings.houses()[0].points, 7);
    }
}
