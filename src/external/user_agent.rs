//! Desktop browser User-Agent strings.
//!
//! The legacy feed host answers non-browser clients with an error page, so
//! every request to it carries one of these.

use rand::seq::IndexedRandom;

/// Browser families present in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
}

/// Desktop operating systems present in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    Mac,
}

const DESKTOP_USER_AGENTS: &[(Browser, Platform, &str)] = &[
    (
        Browser::Chrome,
        Platform::Windows,
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    ),
    (
        Browser::Chrome,
        Platform::Windows,
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    ),
    (
        Browser::Chrome,
        Platform::Linux,
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    ),
    (
        Browser::Chrome,
        Platform::Mac,
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    ),
    (
        Browser::Firefox,
        Platform::Windows,
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    ),
    (
        Browser::Firefox,
        Platform::Linux,
        "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    ),
    (
        Browser::Firefox,
        Platform::Mac,
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:133.0) Gecko/20100101 Firefox/133.0",
    ),
    (
        Browser::Safari,
        Platform::Mac,
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1.1 Safari/605.1.15",
    ),
    (
        Browser::Edge,
        Platform::Windows,
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    ),
    (
        Browser::Edge,
        Platform::Mac,
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    ),
];

/// A random User-Agent for the given browser and platform.
///
/// Combinations missing from the pool (Safari on Windows, say) fall back to
/// Chrome on the same platform.
pub fn user_agent_for(browser: Browser, platform: Platform) -> &'static str {
    let matching: Vec<&'static str> = DESKTOP_USER_AGENTS
        .iter()
        .filter(|(b, p, _)| *b == browser && *p == platform)
        .map(|(_, _, ua)| *ua)
        .collect();

    match matching.choose(&mut rand::rng()).copied() {
        Some(ua) => ua,
        None if browser != Browser::Chrome => user_agent_for(Browser::Chrome, platform),
        None => DESKTOP_USER_AGENTS[0].2,
    }
}

/// Any desktop User-Agent from the pool.
pub fn random_user_agent() -> &'static str {
    DESKTOP_USER_AGENTS
        .choose(&mut rand::rng())
        .map(|(_, _, ua)| *ua)
        .unwrap_or(DESKTOP_USER_AGENTS[0].2)
}
