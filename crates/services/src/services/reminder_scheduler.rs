//! Background sweep that e-mails users about upcoming occasions.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use db::{Storage, StorageError, models::gift_reminder::GiftReminder};
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use super::email::{EmailError, EmailMessage, EmailService};

#[derive(Debug, Error)]
pub enum ReminderSchedulerError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("email error: {0}")]
    Email(#[from] EmailError),
}

pub struct ReminderScheduler {
    storage: Arc<dyn Storage>,
    email: EmailService,
    poll_interval: Duration,
    app_base_url: String,
}

fn days_phrase(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("in {n} days"),
    }
}

pub fn compose_message(
    reminder: &GiftReminder,
    to: &str,
    friend_name: &str,
    next_occurrence: NaiveDate,
    today: NaiveDate,
    gift_ideas: &[String],
    app_base_url: &str,
) -> EmailMessage {
    let when = days_phrase((next_occurrence - today).num_days());
    let mut text = format!(
        "Hi!\n\n{friend_name}'s {occasion} is {when} ({next_occurrence}).\n",
        occasion = reminder.occasion,
    );
    if gift_ideas.is_empty() {
        text.push_str("\nYou have not saved any gift ideas yet. Ask GiftGenie for some inspiration:\n");
    } else {
        text.push_str("\nGift ideas you saved:\n");
        for idea in gift_ideas {
            text.push_str(&format!("  - {idea}\n"));
        }
        text.push_str("\nSee them all at:\n");
    }
    text.push_str(&format!(
        "{}/friends/{}\n",
        app_base_url.trim_end_matches('/'),
        reminder.friend_id
    ));
    if let Some(notes) = &reminder.notes {
        text.push_str(&format!("\nYour notes: {notes}\n"));
    }

    EmailMessage {
        to: to.to_string(),
        subject: format!("{friend_name}'s {} is {when}", reminder.occasion),
        text,
    }
}

impl ReminderScheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        email: EmailService,
        poll_interval: Duration,
        app_base_url: String,
    ) -> Self {
        Self {
            storage,
            email,
            poll_interval,
            app_base_url,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting reminder scheduler with interval {:?}, e-mail transport: {}",
            self.poll_interval,
            self.email.transport_name()
        );

        let mut interval = interval(self.poll_interval);

        loop {
            interval.tick().await;
            let now = Utc::now();
            if let Err(e) = self.run_once(now.date_naive(), now).await {
                error!("Error sweeping gift reminders: {}", e);
            }
        }
    }

    /// Sends every reminder due on `today` and returns how many went out.
    pub async fn run_once(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<usize, ReminderSchedulerError> {
        let due: Vec<_> = self
            .storage
            .active_email_reminders()
            .await?
            .into_iter()
            .filter(|r| r.is_due(today))
            .collect();

        if due.is_empty() {
            debug!("Reminder sweep: nothing due");
            return Ok(0);
        }

        let mut sent = 0;
        for reminder in due {
            match self.notify(&reminder, today, now).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => warn!(
                    reminder_id = %reminder.id,
                    error = %e,
                    "Reminder sweep: failed to notify"
                ),
            }
        }
        info!(sent, "Reminder sweep finished");
        Ok(sent)
    }

    async fn notify(
        &self,
        reminder: &GiftReminder,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool, ReminderSchedulerError> {
        let (Some(to), Some(next)) = (reminder.email.as_deref(), reminder.next_occurrence(today))
        else {
            return Ok(false);
        };
        let Some(friend) = self
            .storage
            .friend(reminder.user_id, reminder.friend_id)
            .await?
        else {
            return Ok(false);
        };
        let ideas: Vec<String> = self
            .storage
            .list_saved_gifts(reminder.user_id, Some(friend.id))
            .await?
            .into_iter()
            .filter(|g| !g.purchased)
            .map(|g| g.name)
            .collect();

        let message =
            compose_message(reminder, to, &friend.name, next, today, &ideas, &self.app_base_url);
        self.email.send(&message).await?;
        self.storage.mark_reminder_notified(reminder.id, now).await?;
        info!(
            reminder_id = %reminder.id,
            friend = %friend.name,
            next_occurrence = %next,
            "Reminder e-mail sent"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use db::{
        MemoryStorage,
        models::{
            friend::CreateFriend,
            gift_reminder::CreateGiftReminder,
            saved_gift::CreateSavedGift,
        },
    };
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup(email_notifications: bool) -> (Arc<MemoryStorage>, Uuid) {
        let storage = Arc::new(MemoryStorage::new());
        let user_id = Uuid::new_v4();
        let friend = storage
            .create_friend(
                user_id,
                &CreateFriend {
                    name: "Maya".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        storage
            .create_saved_gift(
                user_id,
                &CreateSavedGift {
                    friend_id: friend.id,
                    name: "Pour-Over Kit".into(),
                    description: None,
                    price: None,
                    reasoning: None,
                    image_url: None,
                    purchase_url: None,
                    category: None,
                },
            )
            .await
            .unwrap();
        let reminder = storage
            .create_reminder(
                user_id,
                &CreateGiftReminder {
                    friend_id: friend.id,
                    occasion: "Birthday".into(),
                    occasion_date: date(1990, 6, 15),
                    recurring: true,
                    reminder_days_before: 7,
                    email_notifications,
                    email: Some("ada@example.com".into()),
                    notes: None,
                    is_active: true,
                },
            )
            .await
            .unwrap();
        (storage, reminder.id)
    }

    fn scheduler(storage: Arc<MemoryStorage>) -> ReminderScheduler {
        ReminderScheduler::new(
            storage,
            EmailService::log_only(),
            Duration::from_secs(3600),
            "http://localhost:5000".into(),
        )
    }

    #[tokio::test]
    async fn due_reminder_is_sent_once_per_cycle() {
        let (storage, reminder_id) = setup(true).await;
        let scheduler = scheduler(storage.clone());
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 8, 0, 0).unwrap();

        assert_eq!(scheduler.run_once(date(2026, 6, 1), now).await.unwrap(), 0);
        assert_eq!(scheduler.run_once(date(2026, 6, 10), now).await.unwrap(), 1);

        let stored = storage.active_email_reminders().await.unwrap();
        assert_eq!(stored[0].id, reminder_id);
        assert_eq!(stored[0].last_notified_at, Some(now));

        assert_eq!(scheduler.run_once(date(2026, 6, 12), now).await.unwrap(), 0);
        // Next year's cycle fires again.
        assert_eq!(scheduler.run_once(date(2027, 6, 9), now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn silent_reminders_are_skipped() {
        let (storage, _) = setup(false).await;
        assert_eq!(scheduler(storage).run_once(date(2026, 6, 10), Utc::now()).await.unwrap(), 0);
    }

    #[test]
    fn message_lists_saved_ideas() {
        let reminder = GiftReminder {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            friend_id: Uuid::new_v4(),
            occasion: "Birthday".into(),
            occasion_date: date(1990, 6, 15),
            recurring: true,
            reminder_days_before: 7,
            email_notifications: true,
            email: Some("ada@example.com".into()),
            notes: Some("Loves dark roast".into()),
            is_active: true,
            last_notified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let message = compose_message(
            &reminder,
            "ada@example.com",
            "Maya",
            date(2026, 6, 15),
            date(2026, 6, 14),
            &["Pour-Over Kit".into()],
            "https://giftgenie.app/",
        );
        assert_eq!(message.subject, "Maya's Birthday is tomorrow");
        assert!(message.text.contains("  - Pour-Over Kit"));
        assert!(message.text.contains(&format!("https://giftgenie.app/friends/{}", reminder.friend_id)));
        assert!(message.text.contains("Loves dark roast"));
    }
}
