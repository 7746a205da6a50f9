use interfaces::defs::{Classification, EventSummary, NotificationEvent};

/// Telegram `sendMessage` text limit, in characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Render the chat text for an event. One fixed template per classification.
pub fn format_event(event: &NotificationEvent) -> String {
    let text = match (&event.classification, &event.summary) {
        (
            _,
            EventSummary::Feed {
                repository,
                subject_type,
                title,
            },
        ) => format!(
            "🐙 Yangi GitHub notification:\nRepo: {}\nTuri: {}\nSarlavha: {}",
            repository, subject_type, title
        ),
        (Classification::MarketplaceMail, EventSummary::Mail { from, subject }) => {
            format!("💼 Yangi Upwork/email xabari:\nFrom: {}\nSubject: {}", from, subject)
        }
        (_, EventSummary::Mail { from, subject }) => {
            format!("🐙 Yangi GitHub email xabari:\nFrom: {}\nSubject: {}", from, subject)
        }
    };

    truncate_message(&text, TELEGRAM_MESSAGE_LIMIT)
}

/// Cut to at most `limit` characters, marking the cut with an ellipsis.
pub fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use interfaces::defs::SourceKind;

    fn mail_event(classification: Classification) -> NotificationEvent {
        NotificationEvent {
            source: SourceKind::Mailbox,
            item_id: "1".to_string(),
            classification,
            summary: EventSummary::Mail {
                from: "jobs@upwork.com".to_string(),
                subject: "New offer".to_string(),
            },
        }
    }

    #[test]
    fn feed_template() {
        let event = NotificationEvent {
            source: SourceKind::Feed,
            item_id: "102".to_string(),
            classification: Classification::Feed,
            summary: EventSummary::Feed {
                repository: "a/b".to_string(),
                subject_type: "Issue".to_string(),
                title: "bug".to_string(),
            },
        };
        assert_eq!(
            format_event(&event),
            "🐙 Yangi GitHub notification:\nRepo: a/b\nTuri: Issue\nSarlavha: bug"
        );
    }

    #[test]
    fn mail_templates_follow_classification() {
        assert_eq!(
            format_event(&mail_event(Classification::MarketplaceMail)),
            "💼 Yangi Upwork/email xabari:\nFrom: jobs@upwork.com\nSubject: New offer"
        );
        assert!(format_event(&mail_event(Classification::CodeHostMail))
            .starts_with("🐙 Yangi GitHub email xabari:\n"));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "ж".repeat(10);
        assert_eq!(truncate_message(&text, 10), text);

        let cut = truncate_message(&text, 5);
        assert_eq!(cut.chars().count(), 5);
        assert!(cut.ends_with('…'));
    }
}
