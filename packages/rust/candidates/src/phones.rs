//! Phone-number prefix hints derived from a location.
//!
//! Patterns are area-code prefixes (`(415) XXX-XXXX`), never full numbers.
//! They go straight into the report as low-confidence hints.

/// Maximum number of area codes emitted per location.
const MAX_PATTERNS: usize = 5;

/// Region keyword → area codes, most populous first. Cities precede the
/// states that contain them so the more specific match wins.
static AREA_CODES: &[(&str, &[&str])] = &[
    ("new york city", &["212", "718", "917", "646", "347"]),
    ("manhattan", &["212", "646", "917"]),
    ("brooklyn", &["718", "347", "929"]),
    ("los angeles", &["213", "310", "323", "818", "424"]),
    ("san francisco", &["415", "628"]),
    ("san diego", &["619", "858", "760"]),
    ("chicago", &["312", "773", "872"]),
    ("houston", &["713", "281", "832", "346"]),
    ("dallas", &["214", "469", "972"]),
    ("austin", &["512", "737"]),
    ("miami", &["305", "786"]),
    ("seattle", &["206", "425", "253"]),
    ("boston", &["617", "857"]),
    ("atlanta", &["404", "470", "678", "770"]),
    ("california", &["213", "310", "323", "408", "415", "510", "562", "619", "626", "650", "714", "760", "805", "818", "831", "858", "909", "916", "925", "949"]),
    ("new york", &["212", "315", "347", "516", "518", "585", "607", "631", "646", "716", "718", "845", "914", "917"]),
    ("texas", &["210", "214", "254", "281", "325", "361", "409", "430", "432", "469", "512", "682", "713", "737", "806", "817", "830", "832", "903", "915", "936", "940", "956", "972", "979"]),
    ("florida", &["239", "305", "321", "352", "386", "407", "561", "727", "754", "772", "786", "813", "850", "863", "904", "941", "954"]),
    ("illinois", &["312", "773", "630", "847", "708", "815", "217", "309", "618"]),
    ("washington", &["206", "425", "253", "360", "509"]),
    ("massachusetts", &["617", "857", "508", "781", "978", "413"]),
    ("georgia", &["404", "470", "678", "770", "706", "912", "229"]),
    ("pennsylvania", &["215", "267", "412", "610", "717", "570", "814"]),
    ("ohio", &["216", "614", "513", "330", "419", "937", "440"]),
];

/// A single generated prefix pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PhonePrefix {
    pub region: &'static str,
    pub area_code: &'static str,
    pub pattern: String,
}

/// Look up area-code prefixes for a free-form location.
pub(crate) fn patterns_for(location: &str) -> Vec<PhonePrefix> {
    let needle = location.to_lowercase();
    let Some(&(region, codes)) = AREA_CODES.iter().find(|(key, _)| needle.contains(key)) else {
        return Vec::new();
    };

    codes
        .iter()
        .take(MAX_PATTERNS)
        .map(|&code| PhonePrefix {
            region,
            area_code: code,
            pattern: format!("({code}) XXX-XXXX"),
        })
        .collect()
}
