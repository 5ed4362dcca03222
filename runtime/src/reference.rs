use fleet_assist_core::diagnosis::Reference;

struct ReferenceEntry {
    keywords: &'static [&'static str],
    title: &'static str,
    url: &'static str,
}

const ENTRIES: &[ReferenceEntry] = &[
    ReferenceEntry {
        keywords: &["connector", "connectors", "bulk data", "file attached", "print"],
        title: "Chrome Enterprise connectors",
        url: "https://support.google.com/chrome/a/search?q=chrome+enterprise+connectors",
    },
    ReferenceEntry {
        keywords: &["dlp", "data loss", "upload", "paste", "sensitive", "ssn"],
        title: "Chrome data loss prevention rules",
        url: "https://support.google.com/chrome/a/search?q=chrome+data+loss+prevention",
    },
    ReferenceEntry {
        keywords: &["extension", "extensions", "force install", "blocklist"],
        title: "Manage Chrome extensions",
        url: "https://support.google.com/chrome/a/search?q=manage+chrome+extensions",
    },
    ReferenceEntry {
        keywords: &["enroll", "enrollment", "enrolled", "token"],
        title: "Chrome browser cloud management enrollment",
        url: "https://support.google.com/chrome/a/search?q=enroll+cloud+managed+chrome+browsers",
    },
    ReferenceEntry {
        keywords: &["event", "events", "audit", "log", "logs"],
        title: "Chrome log events",
        url: "https://support.google.com/chrome/a/search?q=chrome+log+events",
    },
];

/// Static keyword index over administrator help topics.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceIndex;

impl ReferenceIndex {
    /// Best matching topic for `message`, by number of keyword hits. Ties go
    /// to the earlier entry.
    pub fn lookup(&self, message: &str) -> Option<Reference> {
        let lowered = message.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        let hits = |keyword: &str| {
            if keyword.contains(' ') {
                lowered.contains(keyword)
            } else {
                words.contains(&keyword)
            }
        };

        let mut best: Option<(&ReferenceEntry, usize)> = None;
        for entry in ENTRIES {
            let score = entry.keywords.iter().filter(|keyword| hits(keyword)).count();
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((entry, score));
            }
        }
        best.map(|(entry, _)| Reference {
            title: entry.title.to_string(),
            url: entry.url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_topic_with_most_hits() {
        let reference = ReferenceIndex
            .lookup("Why is the DLP rule not blocking SSN uploads?")
            .expect("reference found");
        assert_eq!(reference.title, "Chrome data loss prevention rules");
    }

    #[test]
    fn multi_word_keywords_match_phrases() {
        let reference = ReferenceIndex
            .lookup("Bulk data entry connector is ignored")
            .expect("reference found");
        assert_eq!(reference.title, "Chrome Enterprise connectors");
    }

    #[test]
    fn matches_whole_words_only() {
        assert!(ReferenceIndex.lookup("preventing").is_none());
        assert!(ReferenceIndex.lookup("hello there").is_none());
    }
}
