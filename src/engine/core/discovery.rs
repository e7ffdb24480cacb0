use super::locator::Locator;
use super::types::MediaInfo;
use anyhow::{Result, bail};
use tracing::debug;

/// Titles probed when looking for the main feature of a disc
pub const MAX_DISC_TITLES: u32 = 8;

/// Source of `MediaInfo` for a locator
pub trait Discoverer {
    fn discover(&self, locator: &Locator) -> Result<MediaInfo>;
}

impl<T: Discoverer + ?Sized> Discoverer for &T {
    fn discover(&self, locator: &Locator) -> Result<MediaInfo> {
        (**self).discover(locator)
    }
}

/// Find the longest title on a disc.
///
/// Titles `1..=max_titles` are probed in order. The first failure after a
/// successful probe ends the search, since discs number titles contiguously.
pub fn find_longest_title(
    discoverer: &dyn Discoverer,
    device: &str,
    chapter: Option<u32>,
    audio: Option<u32>,
    max_titles: u32,
) -> Result<(u32, MediaInfo)> {
    let mut candidates: Vec<(u32, MediaInfo)> = Vec::new();

    for title in 1..=max_titles {
        let locator = Locator::Disc {
            device: device.to_string(),
            title: Some(title),
            chapter,
            audio,
        };
        match discoverer.discover(&locator) {
            Ok(info) if info.is_usable() => {
                debug!("Title {} lasts {:?}", title, info.duration);
                candidates.push((title, info));
            }
            Ok(_) => debug!("Title {} has no usable streams", title),
            Err(e) if !candidates.is_empty() => {
                debug!("Stopping title search at {}: {}", title, e);
                break;
            }
            Err(e) => debug!("Title {} not readable: {}", title, e),
        }
    }

    // max_by_key keeps the last maximum; reverse so ties go to the lower title
    match candidates
        .into_iter()
        .rev()
        .max_by_key(|(_, info)| info.duration.unwrap_or_default())
    {
        Some(best) => {
            debug!("Longest title found is {}", best.0);
            Ok(best)
        }
        None => bail!("No valid DVD title found"),
    }
}
