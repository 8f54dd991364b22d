//! Sample table interpretation: maps each sample to its file byte offset,
//! size, timestamps and keyframe status.
//!
//! Combines the parsed stsc, stsz, stco/co64, stts, ctts and stss data into a
//! flat list of [`SamplePosition`] in decode order.

use crate::iso::boxes::{CttsEntry, SampleTableBoxes, StscEntry, StszBox, SttsEntry};
use mt_common::{DemuxError, DemuxResult, SamplePosition};
use tracing::{debug, warn};

/// Expand a track's sample tables into per-sample positions.
///
/// Returns `None` when the tables needed to locate samples (stsz, stsc,
/// chunk offsets) are missing or disagree with each other. A track without
/// positions is still a usable track.
pub fn sample_positions(table: &SampleTableBoxes, track_id: u32) -> Option<Vec<SamplePosition>> {
    let (Some(stts), Some(stsz), Some(stsc), Some(chunk_offsets)) =
        (&table.stts, &table.stsz, &table.stsc, &table.chunk_offsets)
    else {
        debug!("track {}: sample tables not present", track_id);
        return None;
    };

    match build(table, stts, stsz, stsc, chunk_offsets) {
        Ok(samples) => {
            debug!("track {}: {} sample positions", track_id, samples.len());
            Some(samples)
        }
        Err(e) => {
            warn!("track {}: unusable sample tables: {}", track_id, e);
            None
        }
    }
}

fn build(
    table: &SampleTableBoxes,
    stts: &[SttsEntry],
    stsz: &StszBox,
    stsc: &[StscEntry],
    chunk_offsets: &[u64],
) -> DemuxResult<Vec<SamplePosition>> {
    let sample_count = stsz.sample_count as usize;
    if sample_count == 0 {
        return Ok(Vec::new());
    }

    // Step 1: sample → (offset, size) from stsc + stco + stsz
    let offsets_and_sizes = build_sample_offsets(
        stsc,
        chunk_offsets,
        &stsz.sample_sizes,
        stsz.default_sample_size,
        sample_count,
    )?;

    // Step 2: decode timestamps and durations from stts
    let timing = build_dts_array(stts, sample_count);

    // Step 3: composition offsets from ctts
    let cts_offsets = build_cts_offsets(table.ctts.as_deref().unwrap_or_default(), sample_count);

    // Step 4: sync samples from stss; absent means every sample is sync
    let sync = table.sync_samples.as_deref().map(|s| {
        let mut sorted = s.to_vec();
        sorted.sort_unstable();
        sorted
    });

    let mut samples = Vec::with_capacity(sample_count);
    for (i, ((offset, size), (dts, duration))) in offsets_and_sizes
        .into_iter()
        .zip(timing)
        .enumerate()
    {
        let is_keyframe = match &sync {
            None => true,
            Some(set) => set.binary_search(&(i as u32 + 1)).is_ok(),
        };
        samples.push(SamplePosition {
            offset,
            size,
            dts,
            cts: dts as i64 + cts_offsets[i] as i64,
            duration,
            is_keyframe,
        });
    }

    Ok(samples)
}

/// Build a vec of (file_offset, size) for each sample, using stsc + stco + stsz.
fn build_sample_offsets(
    stsc: &[StscEntry],
    chunk_offsets: &[u64],
    sample_sizes: &[u32],
    default_sample_size: u32,
    sample_count: usize,
) -> DemuxResult<Vec<(u64, u32)>> {
    if default_sample_size == 0 && sample_sizes.len() < sample_count {
        return Err(DemuxError::invalid(
            0,
            format!(
                "stsz lists {} sizes for {} samples",
                sample_sizes.len(),
                sample_count
            ),
        ));
    }

    // Bound the declared count by what the chunks can hold before
    // allocating for it.
    let chunk_capacity: u64 = (1..=chunk_offsets.len() as u32)
        .map(|chunk_num| samples_per_chunk_for(stsc, chunk_num) as u64)
        .sum();
    if (sample_count as u64) > chunk_capacity {
        return Err(DemuxError::invalid(
            0,
            format!(
                "chunks hold {} samples but stsz declares {} (stsc/stco/stsz mismatch)",
                chunk_capacity, sample_count
            ),
        ));
    }

    let mut result = Vec::with_capacity(sample_count);

    for (chunk_idx, &chunk_offset) in chunk_offsets.iter().enumerate() {
        if result.len() >= sample_count {
            break;
        }

        // chunk numbers are 1-based in stsc
        let samples_in_chunk = samples_per_chunk_for(stsc, chunk_idx as u32 + 1);
        let mut offset = chunk_offset;

        for _ in 0..samples_in_chunk {
            let sample_idx = result.len();
            if sample_idx >= sample_count {
                break;
            }
            let size = if default_sample_size > 0 {
                default_sample_size
            } else {
                sample_sizes[sample_idx]
            };
            result.push((offset, size));
            offset = offset.checked_add(size as u64).ok_or_else(|| {
                DemuxError::invalid(
                    chunk_offset,
                    format!("sample {} extends past the u64 range", sample_idx + 1),
                )
            })?;
        }
    }

    Ok(result)
}

/// Samples in the given 1-based chunk: the last stsc entry whose
/// first_chunk <= chunk_num applies.
fn samples_per_chunk_for(stsc: &[StscEntry], chunk_num: u32) -> u32 {
    stsc.iter()
        .take_while(|e| e.first_chunk <= chunk_num)
        .last()
        .map_or(0, |e| e.samples_per_chunk)
}

/// (dts, duration) per sample from stts. Samples past the end of the table
/// repeat the last delta.
fn build_dts_array(stts: &[SttsEntry], sample_count: usize) -> Vec<(u64, u32)> {
    let mut timing = Vec::with_capacity(sample_count);
    let mut dts: u64 = 0;

    'outer: for entry in stts {
        for _ in 0..entry.sample_count {
            if timing.len() >= sample_count {
                break 'outer;
            }
            timing.push((dts, entry.sample_delta));
            dts = dts.saturating_add(entry.sample_delta as u64);
        }
    }

    let last_delta = stts.last().map_or(0, |e| e.sample_delta);
    while timing.len() < sample_count {
        timing.push((dts, last_delta));
        dts = dts.saturating_add(last_delta as u64);
    }

    timing
}

/// Composition offset per sample from ctts, zero-padded.
fn build_cts_offsets(ctts: &[CttsEntry], sample_count: usize) -> Vec<i32> {
    let mut offsets: Vec<i32> = ctts
        .iter()
        .flat_map(|e| std::iter::repeat(e.sample_offset).take(e.sample_count as usize))
        .take(sample_count)
        .collect();
    offsets.resize(sample_count, 0);
    offsets
}
