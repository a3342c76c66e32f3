//! Choosing the release asset that fits the target platform.

use crate::core::{Bits, Os};

/// Pick the best download for `os`/`bits` out of `urls`.
///
/// Candidates are tried in this order, taking the first match:
///
/// 1. file names containing the OS key and the target bit-width
/// 2. file names containing the OS key but not the other bit-width
/// 3. file names containing the OS key
/// 4. with `break_ties_by_type`, names ending in the OS's native extension,
///    then `.jar`
/// 5. any asset
///
/// `mac` in a file name counts as the `osx` key. Matching is done on the
/// lower-cased last path segment.
#[must_use]
pub fn best_asset(urls: &[String], os: Os, bits: Bits, break_ties_by_type: bool) -> Option<&str> {
    let key = os.key();
    let wanted_bits = bits.as_str();
    let wrong_bits = bits.opposite().as_str();

    let os_files: Vec<(&str, String)> = urls
        .iter()
        .map(|u| (u.as_str(), file_name(u).to_lowercase()))
        .filter(|(_, name)| name.contains(key) || (os == Os::Osx && name.contains("mac")))
        .collect();

    let bitted = os_files.iter().find(|(_, name)| name.contains(wanted_bits));
    let un_bitted = os_files.iter().find(|(_, name)| !name.contains(wrong_bits));

    if let Some((url, _)) = bitted.or(un_bitted).or(os_files.first()) {
        return Some(*url);
    }

    if break_ties_by_type {
        let typed = urls
            .iter()
            .find(|u| u.ends_with(os.typical_extension()))
            .or_else(|| urls.iter().find(|u| u.ends_with(".jar")));
        if let Some(url) = typed {
            return Some(url.as_str());
        }
    }

    urls.first().map(String::as_str)
}

/// Last path segment of a URL, without query string.
#[must_use]
pub fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}
