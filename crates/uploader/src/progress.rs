//! Batch-level progress figures.
//!
//! Uploaded bytes are always recomputed from scratch out of per-item
//! progress, never incremented, so a late, repeated or backwards item
//! update cannot drift the total.

use std::time::Duration;

use crate::types::{ItemStatus, UploadBatch};

/// Estimated time to batch completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    /// No speed figure yet.
    Unknown,
    /// Everything is transferred.
    Done,
    Remaining(Duration),
}

/// ETA from batch totals and the cumulative average speed.
pub fn eta(total_bytes: u64, uploaded_bytes: u64, average_speed: f64) -> Eta {
    if uploaded_bytes >= total_bytes {
        return Eta::Done;
    }
    if average_speed <= 0.0 {
        return Eta::Unknown;
    }
    let secs = (total_bytes - uploaded_bytes) as f64 / average_speed;
    Eta::Remaining(Duration::from_secs_f64(secs))
}

impl UploadBatch {
    pub fn eta(&self) -> Eta {
        eta(self.total_bytes, self.uploaded_bytes, self.average_speed)
    }
}

/// Recomputes the batch's derived figures from its items.
///
/// uploaded = Σ(progress/100 × size); speed is the cumulative average
/// since the batch started, which smooths over per-part bursts.
pub(crate) fn recompute(batch: &mut UploadBatch) {
    let uploaded: f64 = batch
        .items
        .iter()
        .map(|item| item.progress / 100.0 * item.size as f64)
        .sum();
    batch.uploaded_bytes = uploaded.round() as u64;
    batch.completed_files = batch
        .items
        .iter()
        .filter(|i| i.status == ItemStatus::Success)
        .count();
    batch.failed_files = batch
        .items
        .iter()
        .filter(|i| i.status == ItemStatus::Failed)
        .count();

    let elapsed = batch.started_at.elapsed().as_secs_f64();
    batch.average_speed = if elapsed > 0.0 { uploaded / elapsed } else { 0.0 };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UploadItem;
    use chrono::Utc;
    use std::time::Instant;

    fn item(size: u64, progress: f64, status: ItemStatus) -> UploadItem {
        UploadItem {
            id: "i".into(),
            file_name: "f.jpg".into(),
            content_type: "image/jpeg".into(),
            size,
            path: None,
            status,
            progress,
            attempts: 0,
            error: None,
            photo_id: None,
        }
    }

    fn batch(items: Vec<UploadItem>) -> UploadBatch {
        let total = items.iter().map(|i| i.size).sum();
        UploadBatch {
            id: "b".into(),
            gallery_id: "g".into(),
            album_id: "a".into(),
            created_at: Utc::now(),
            total_bytes: total,
            uploaded_bytes: 0,
            completed_files: 0,
            failed_files: 0,
            average_speed: 0.0,
            compress: false,
            items,
            started_at: Instant::now(),
        }
    }

    #[test]
    fn uploaded_bytes_is_weighted_sum() {
        let mut b = batch(vec![
            item(1000, 50.0, ItemStatus::Uploading),
            item(500, 100.0, ItemStatus::Success),
            item(300, 0.0, ItemStatus::Queued),
        ]);
        recompute(&mut b);
        assert_eq!(b.uploaded_bytes, 1000);
        assert_eq!(b.completed_files, 1);
        assert_eq!(b.failed_files, 0);
    }

    #[test]
    fn recompute_tolerates_backwards_progress() {
        let mut b = batch(vec![item(1000, 80.0, ItemStatus::Uploading)]);
        recompute(&mut b);
        assert_eq!(b.uploaded_bytes, 800);

        // An item is allowed to report less than before; the total follows.
        b.items[0].progress = 30.0;
        recompute(&mut b);
        assert_eq!(b.uploaded_bytes, 300);
    }

    #[test]
    fn failed_items_keep_partial_progress_in_total() {
        let mut b = batch(vec![
            item(1000, 40.0, ItemStatus::Failed),
            item(1000, 100.0, ItemStatus::Success),
        ]);
        recompute(&mut b);
        assert_eq!(b.uploaded_bytes, 1400);
        assert_eq!(b.failed_files, 1);
    }

    #[test]
    fn eta_unknown_without_speed() {
        assert_eq!(eta(100, 0, 0.0), Eta::Unknown);
    }

    #[test]
    fn eta_done_when_uploaded_reaches_total() {
        assert_eq!(eta(100, 100, 5.0), Eta::Done);
        assert_eq!(eta(0, 0, 0.0), Eta::Done);
    }

    #[test]
    fn eta_remaining_from_average_speed() {
        match eta(1000, 400, 60.0) {
            Eta::Remaining(d) => assert_eq!(d.as_secs(), 10),
            other => panic!("expected Remaining, got {other:?}"),
        }
    }
}
