use async_trait::async_trait;
use mockall::mock;
use std::sync::{Arc, Mutex};

use crate::clients::conference::{ConferenceApi, CreateMeetingRequest, CreatedMeeting};
use crate::clients::lessons::LessonDirectory;
use crate::clients::mail::{MailApi, SendReceipt};
use crate::error::{ConferenceApiError, MailApiError, StoreError};
use crate::models::lesson::{Lesson, LessonStatus, Party};

// Mock the lesson store behind its trait
mock! {
    pub LessonStore {}

    #[async_trait]
    impl LessonDirectory for LessonStore {
        async fn list_confirmed_lessons(&self) -> Result<Vec<Lesson>, StoreError>;
        async fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>, StoreError>;
        async fn get_user(&self, user_id: &str) -> Result<Party, StoreError>;
    }
}

// Mock the mail transport
mock! {
    pub Mail {}

    #[async_trait]
    impl MailApi for Mail {
        async fn send_message(
            &self,
            to: &str,
            subject: &str,
            body: &str,
        ) -> Result<SendReceipt, MailApiError>;
        fn is_configured(&self) -> bool;
        fn sender_address(&self) -> &str;
    }
}

// Mock the conference provider
mock! {
    pub Conference {}

    #[async_trait]
    impl ConferenceApi for Conference {
        async fn create_meeting(
            &self,
            request: &CreateMeetingRequest,
        ) -> Result<CreatedMeeting, ConferenceApiError>;
        fn is_configured(&self) -> bool;
    }
}

/// One message as a capturing mail mock saw it.
#[derive(Debug, Clone)]
pub struct CapturedMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Shared outbox capturing everything a test run tried to send.
#[derive(Clone, Default)]
pub struct MailDrop {
    messages: Arc<Mutex<Vec<CapturedMessage>>>,
}

impl MailDrop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, to: &str, subject: &str, body: &str) {
        self.messages.lock().unwrap().push(CapturedMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
    }

    pub fn messages(&self) -> Vec<CapturedMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn to_addresses(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.to).collect()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.subject).collect()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.body).collect()
    }
}

// Mail mock that accepts everything and drops a copy in the outbox
pub fn setup_capturing_mail(outbox: &MailDrop) -> MockMail {
    let mut mail = MockMail::new();

    let sink = outbox.clone();
    mail.expect_send_message().returning(move |to, subject, body| {
        sink.push(to, subject, body);
        Ok(SendReceipt {
            id: Some(format!("msg_{}", rand::random::<u32>())),
            simulated: false,
        })
    });

    mail.expect_is_configured().return_const(true);
    mail.expect_sender_address()
        .return_const("reminders@example.com".to_string());

    mail
}

// Lesson store mock wired against in-memory fixtures
pub fn setup_lesson_store(lessons: Vec<Lesson>, users: Vec<Party>) -> MockLessonStore {
    let mut store = MockLessonStore::new();

    let listed = lessons.clone();
    store.expect_list_confirmed_lessons().returning(move || {
        Ok(listed
            .iter()
            .filter(|lesson| lesson.status == LessonStatus::Confirmed)
            .cloned()
            .collect())
    });

    let by_id = lessons;
    store.expect_get_lesson().returning(move |lesson_id| {
        Ok(by_id.iter().find(|lesson| lesson.id == lesson_id).cloned())
    });

    store.expect_get_user().returning(move |user_id| {
        users
            .iter()
            .find(|user| user.id == user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "user",
                id: user_id.to_string(),
            })
    });

    store
}

// Conference mock that provisions a meeting for every request
pub fn setup_live_conference() -> MockConference {
    let mut conference = MockConference::new();

    conference.expect_is_configured().return_const(true);
    conference.expect_create_meeting().returning(|_request| {
        let meeting_id = format!("conf_{}", rand::random::<u32>());
        Ok(CreatedMeeting {
            join_url: format!("https://meet.provider.example/j/{}", meeting_id),
            meeting_id,
        })
    });

    conference
}

// Conference mock with no credentials; create_meeting must never be called
pub fn setup_offline_conference() -> MockConference {
    let mut conference = MockConference::new();
    conference.expect_is_configured().return_const(false);
    conference
}
