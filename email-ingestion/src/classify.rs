use interfaces::defs::Classification;

/// Substring markers deciding which mails are worth forwarding.
///
/// Matching is case-insensitive. Marketplace rules win over code-host rules
/// when a message matches both.
#[derive(Clone, Debug)]
pub struct MailRules {
    pub marketplace_senders: Vec<String>,
    pub marketplace_subjects: Vec<String>,
    pub code_host_senders: Vec<String>,
}

impl Default for MailRules {
    fn default() -> Self {
        Self {
            marketplace_senders: vec!["upwork.com".to_string()],
            marketplace_subjects: vec!["upwork".to_string()],
            code_host_senders: vec!["github.com".to_string()],
        }
    }
}

impl MailRules {
    pub fn classify(&self, from: &str, subject: &str) -> Option<Classification> {
        let from = from.to_lowercase();
        let subject = subject.to_lowercase();

        if contains_any(&from, &self.marketplace_senders)
            || contains_any(&subject, &self.marketplace_subjects)
        {
            Some(Classification::MarketplaceMail)
        } else if contains_any(&from, &self.code_host_senders) {
            Some(Classification::CodeHostMail)
        } else {
            None
        }
    }
}

fn contains_any(haystack: &str, markers: &[String]) -> bool {
    markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .any(|marker| haystack.contains(&marker.to_lowercase()))
}
