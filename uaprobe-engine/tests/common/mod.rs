//! Reference data set and User-Agent corpora shared by the integration tests
//! and the benches.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use uaprobe_core::PropertyType;
use uaprobe_datafile::DataFileBuilder;

pub const IPHONE_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
pub const ANDROID_CHROME: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
pub const WINDOWS_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const MAC_FIREFOX: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:120.0) Gecko/20100101 Firefox/120.0";
pub const LINUX_FIREFOX: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0";
pub const GOOGLEBOT: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

/// Canonical User-Agents with their expected `IsMobile` and `BrowserName`.
pub const CANONICAL: &[(&str, bool, &str)] = &[
    (IPHONE_SAFARI, true, "Mobile Safari"),
    (ANDROID_CHROME, true, "Chrome Mobile"),
    (WINDOWS_CHROME, false, "Chrome"),
    (MAC_FIREFOX, false, "Firefox"),
    (LINUX_FIREFOX, false, "Firefox"),
    (GOOGLEBOT, false, "Googlebot"),
];

pub const UNKNOWN_PROFILE_ID: u32 = 0;

/// Builds the reference data set: the canonical signatures first, then
/// `generated` synthetic ones.
pub fn reference_data(generated: usize) -> Bytes {
    let mut builder = DataFileBuilder::new("reference");
    builder.published(1_700_000_000);

    let is_mobile = builder.property("IsMobile", PropertyType::Bool);
    let is_crawler = builder.property("IsCrawler", PropertyType::Bool);
    let browser = builder.property_with_description(
        "BrowserName",
        PropertyType::String,
        "Name of the browser or crawler",
    );
    let platform = builder.property("PlatformName", PropertyType::String);
    let width = builder.property("ScreenPixelsWidth", PropertyType::Integer);
    let inches = builder.property("ScreenInchesDiagonal", PropertyType::Double);
    let languages = builder.property("Languages", PropertyType::List);

    let unknown = builder.profile(
        UNKNOWN_PROFILE_ID,
        &[
            (is_mobile, "False"),
            (is_crawler, "False"),
            (browser, "Unknown"),
            (platform, "Unknown"),
        ],
    );
    builder.default_profile(unknown);

    let iphone = builder.profile(
        101,
        &[
            (is_mobile, "True"),
            (is_crawler, "False"),
            (browser, "Mobile Safari"),
            (platform, "iOS"),
            (width, "1179"),
            (inches, "6.1"),
            (languages, "en"),
            (languages, "fr"),
        ],
    );
    let android = builder.profile(
        102,
        &[
            (is_mobile, "True"),
            (is_crawler, "False"),
            (browser, "Chrome Mobile"),
            (platform, "Android"),
            (width, "1080"),
        ],
    );
    let windows = builder.profile(
        103,
        &[
            (is_mobile, "False"),
            (is_crawler, "False"),
            (browser, "Chrome"),
            (platform, "Windows"),
            (width, "1920"),
        ],
    );
    let mac = builder.profile(
        104,
        &[
            (is_mobile, "False"),
            (is_crawler, "False"),
            (browser, "Firefox"),
            (platform, "macOS"),
        ],
    );
    let linux = builder.profile(
        105,
        &[
            (is_mobile, "False"),
            (is_crawler, "False"),
            (browser, "Firefox"),
            (platform, "Linux"),
        ],
    );
    let bot = builder.profile(
        106,
        &[
            (is_mobile, "False"),
            (is_crawler, "True"),
            (browser, "Googlebot"),
            (platform, "Unknown"),
        ],
    );
    let synthetic_mobile = builder.profile(
        200,
        &[(is_mobile, "True"), (browser, "Synthetic"), (platform, "Embedded")],
    );
    let synthetic_desktop = builder.profile(
        201,
        &[(is_mobile, "False"), (browser, "Synthetic"), (platform, "Embedded")],
    );

    builder.signature(iphone, IPHONE_SAFARI);
    builder.signature(android, ANDROID_CHROME);
    builder.signature(windows, WINDOWS_CHROME);
    builder.signature(mac, MAC_FIREFOX);
    builder.signature(linux, LINUX_FIREFOX);
    builder.signature(bot, GOOGLEBOT);

    for i in 0..generated {
        let profile = if i % 3 == 0 {
            synthetic_mobile
        } else {
            synthetic_desktop
        };
        builder.signature(profile, generated_user_agent(i));
    }
    builder.encode()
}

/// Writes the reference data set into `dir` and returns its path.
pub fn write_reference_data(dir: &Path, generated: usize) -> PathBuf {
    let path = dir.join("reference.uapd");
    std::fs::write(&path, reference_data(generated)).expect("write reference data file");
    path
}

/// Synthetic signature `i`. Each one carries tokens no other signature has.
pub fn generated_user_agent(i: usize) -> String {
    format!(
        "Probe{i}/{}.{} (Synthetic; Model-{i}; Build {}) Render{}/{}.0",
        i % 9,
        i % 17,
        i * 7 + 3,
        i % 5,
        i % 50
    )
}

/// Inputs that resemble nothing in the data set.
pub fn bad_user_agents() -> Vec<String> {
    let mut corpus: Vec<String> = [
        "",
        " ",
        ";;;;",
        "()()()",
        "\u{0}\u{1}\u{2}",
        "qwertyuiop asdfghjkl",
        "💥💥💥 🚀",
        "curl",
        "\"quoted\" [bracketed] /slashed/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    corpus.push("x".repeat(100_000));
    corpus.push("a b ".repeat(20_000));
    corpus.push("é".repeat(700));
    corpus
}

/// Canonical User-Agents with browser versions moved on.
pub fn unique_user_agents() -> Vec<String> {
    vec![
        IPHONE_SAFARI.replace("17_1", "17_2").replace("17.1", "17.2"),
        ANDROID_CHROME.replace("120.0.0.0", "121.0.6167.101"),
        WINDOWS_CHROME.replace("120.0.0.0", "119.0.6045.199"),
        MAC_FIREFOX.replace("120.0", "121.0"),
        LINUX_FIREFOX.replace("120.0", "118.0"),
    ]
}

/// Random printable and non-printable noise, reproducible from `seed`.
pub fn random_user_agents(seed: u64, count: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let len = rng.random_range(0..400);
            if rng.random_bool(0.5) {
                (0..len)
                    .map(|_| char::from(rng.random_range(0x20u8..0x7f)))
                    .collect()
            } else {
                let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
                String::from_utf8_lossy(&bytes).into_owned()
            }
        })
        .collect()
}
