use rand::{seq::IndexedRandom, Rng};

const ANDROID_VERSIONS: &[&str] = &["10", "11", "12", "13", "14"];

const DEVICE_MODELS: &[&str] = &[
    "SM-G991B",
    "SM-G998B",
    "SM-A525F",
    "SM-S911B",
    "Pixel 6",
    "Pixel 7 Pro",
    "Pixel 8",
    "M2101K6G",
    "2201117TY",
    "CPH2207",
    "RMX3363",
];

const CHROME_MAJOR_VERSIONS: std::ops::RangeInclusive<u32> = 116..=128;

/// Generate a random Android Chrome user agent
pub fn generate_random_user_agent() -> String {
    let mut rng = rand::rng();

    let android = ANDROID_VERSIONS.choose(&mut rng).copied().unwrap_or("13");
    let model = DEVICE_MODELS.choose(&mut rng).copied().unwrap_or("Pixel 7 Pro");
    let major = rng.random_range(CHROME_MAJOR_VERSIONS);
    let build = rng.random_range(5000..=6700);
    let patch = rng.random_range(50..=200);

    format!(
        "Mozilla/5.0 (Linux; Android {}; {}) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/{}.0.{}.{} Mobile Safari/537.36",
        android, model, major, build, patch
    )
}

/// Chrome major version embedded in a user agent
pub fn chrome_major_version(user_agent: &str) -> Option<u32> {
    let start = user_agent.find("Chrome/")? + "Chrome/".len();
    user_agent[start..]
        .split('.')
        .next()
        .and_then(|major| major.parse().ok())
}

/// Client hint headers matching `user_agent`
pub fn sec_ch_ua_headers(user_agent: &str) -> Vec<(&'static str, String)> {
    let mut headers = Vec::new();

    if let Some(major) = chrome_major_version(user_agent) {
        headers.push((
            "sec-ch-ua",
            format!(
                "\"Chromium\";v=\"{0}\", \"Android WebView\";v=\"{0}\", \"Not?A_Brand\";v=\"24\"",
                major
            ),
        ));
    }

    let mobile = if user_agent.contains("Mobile") {
        "?1"
    } else {
        "?0"
    };
    headers.push(("sec-ch-ua-mobile", mobile.to_string()));

    let platform = if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("iPhone") {
        "iOS"
    } else {
        "Windows"
    };
    headers.push(("sec-ch-ua-platform", format!("\"{}\"", platform)));

    headers
}
