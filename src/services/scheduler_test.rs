#[cfg(test)]
mod scheduler_tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    use crate::client_mock::{
        setup_capturing_mail, setup_lesson_store, setup_live_conference, setup_offline_conference,
        MailDrop, MockConference, MockLessonStore, MockMail,
    };
    use crate::error::{ConferenceApiError, ScanError, StoreError};
    use crate::models::lesson::{Lesson, LessonStatus, Party};
    use crate::models::report::{FinalReminderOutcome, LessonPhase};
    use crate::models::schedule::{MeetingLink, ReminderWindow};
    use crate::services::dispatch::NotificationDispatcher;
    use crate::services::provisioner::LinkProvisioner;
    use crate::services::scheduler::{classify_phase, ReminderScheduler};
    use crate::services::send_ledger::{SendLedger, SendRow};

    // Mid-minute so that labels, which carry no seconds, land where the
    // test wants them relative to now.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 30).unwrap()
    }

    fn confirmed_lesson(id: &str, start: DateTime<Utc>) -> Lesson {
        Lesson {
            id: id.to_string(),
            subject: "Mathematics".to_string(),
            date: start.date_naive(),
            time: start.format("%H:%M").to_string(),
            duration_minutes: 60,
            status: LessonStatus::Confirmed,
            student_id: "stu-1".to_string(),
            tutor_id: "tut-1".to_string(),
        }
    }

    fn test_users() -> Vec<Party> {
        vec![
            Party {
                id: "stu-1".to_string(),
                name: "Alice Johnson".to_string(),
                email: "alice@example.com".to_string(),
            },
            Party {
                id: "tut-1".to_string(),
                name: "Bob Smith".to_string(),
                email: "bob@example.com".to_string(),
            },
        ]
    }

    fn build_scheduler(
        store: MockLessonStore,
        mail: MockMail,
        conference: MockConference,
        dir: &TempDir,
    ) -> (ReminderScheduler, Arc<SendLedger>) {
        let ledger = Arc::new(SendLedger::new(
            dir.path().join("ledger.csv").to_str().unwrap(),
        ));
        let dispatcher = NotificationDispatcher::new(Arc::new(mail));
        let provisioner = LinkProvisioner::new(Arc::new(conference), "meet.jit.si");
        let scheduler =
            ReminderScheduler::new(Arc::new(store), dispatcher, provisioner, Arc::clone(&ledger));
        (scheduler, ledger)
    }

    fn spent_row(lesson_id: &str, window: ReminderWindow) -> SendRow {
        SendRow {
            lesson_id: lesson_id.to_string(),
            window: window.as_str().to_string(),
            lesson_start: "2025-06-02T12:01:00+00:00".to_string(),
            subject: "Mathematics".to_string(),
            student_email: "alice@example.com".to_string(),
            tutor_email: "bob@example.com".to_string(),
            student_accepted: true,
            tutor_accepted: true,
            join_url: String::new(),
            link_source: String::new(),
            sent_at: "2025-06-02T11:00:30+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_lesson_45_minutes_out_gets_hour_reminder_only() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let store = setup_lesson_store(
            vec![confirmed_lesson("lesson-1", now + Duration::minutes(45))],
            test_users(),
        );
        // No create_meeting expectation: provisioning must not happen
        let mut conference = MockConference::new();
        conference.expect_is_configured().return_const(true);

        let (scheduler, ledger) =
            build_scheduler(store, setup_capturing_mail(&outbox), conference, &dir);
        let report = scheduler.scan(now).await.unwrap();

        assert_eq!(report.lessons_considered, 1);
        assert_eq!(report.reminders_sent, 1);
        assert_eq!(report.sends_failed, 0);
        assert_eq!(report.duplicates_suppressed, 0);

        assert_eq!(outbox.count(), 2);
        for subject in outbox.subjects() {
            assert!(subject.contains("starts in 1 hour"));
        }
        let recipients = outbox.to_addresses();
        assert!(recipients.contains(&"alice@example.com".to_string()));
        assert!(recipients.contains(&"bob@example.com".to_string()));

        assert!(ledger.was_sent("lesson-1", ReminderWindow::OneHour).unwrap());
        assert!(!ledger.was_sent("lesson-1", ReminderWindow::OneMinute).unwrap());
    }

    #[tokio::test]
    async fn test_imminent_lesson_gets_final_reminder_with_link() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let store = setup_lesson_store(
            vec![confirmed_lesson("lesson-1", now + Duration::seconds(30))],
            test_users(),
        );

        let (scheduler, ledger) = build_scheduler(
            store,
            setup_capturing_mail(&outbox),
            setup_live_conference(),
            &dir,
        );
        // The hour window was spent on an earlier pass
        ledger
            .record(spent_row("lesson-1", ReminderWindow::OneHour))
            .unwrap();

        let report = scheduler.scan(now).await.unwrap();

        assert_eq!(report.lessons_considered, 1);
        assert_eq!(report.reminders_sent, 1);
        assert_eq!(report.duplicates_suppressed, 1);

        // Both recipients got the final reminder and it carries the join URL
        assert_eq!(outbox.count(), 2);
        for body in outbox.bodies() {
            assert!(body.contains("Join here: https://meet.provider.example/j/conf_"));
        }
        assert!(ledger.was_sent("lesson-1", ReminderWindow::OneMinute).unwrap());

        let rows = ledger.rows_for_lesson("lesson-1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].window, "one_minute");
        assert_eq!(rows[1].link_source, "live");
    }

    #[tokio::test]
    async fn test_fresh_imminent_lesson_fires_both_windows_in_order() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let store = setup_lesson_store(
            vec![confirmed_lesson("lesson-1", now + Duration::seconds(30))],
            test_users(),
        );

        let (scheduler, ledger) = build_scheduler(
            store,
            setup_capturing_mail(&outbox),
            setup_live_conference(),
            &dir,
        );
        let report = scheduler.scan(now).await.unwrap();

        // Thirty seconds out with a clean ledger: both windows cover it
        assert_eq!(report.reminders_sent, 2);
        assert_eq!(report.duplicates_suppressed, 0);
        assert_eq!(outbox.count(), 4);

        let subjects = outbox.subjects();
        assert!(subjects[0].contains("starts in 1 hour"));
        assert!(subjects[1].contains("starts in 1 hour"));
        assert!(subjects[2].contains("starts now"));
        assert!(subjects[3].contains("starts now"));

        assert!(ledger.was_sent("lesson-1", ReminderWindow::OneHour).unwrap());
        assert!(ledger.was_sent("lesson-1", ReminderWindow::OneMinute).unwrap());
    }

    #[tokio::test]
    async fn test_repeated_scans_do_not_double_send() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let store = setup_lesson_store(
            vec![confirmed_lesson("lesson-1", now + Duration::minutes(45))],
            test_users(),
        );
        let mut conference = MockConference::new();
        conference.expect_is_configured().return_const(true);

        let (scheduler, _ledger) =
            build_scheduler(store, setup_capturing_mail(&outbox), conference, &dir);

        let first = scheduler.scan(now).await.unwrap();
        assert_eq!(first.reminders_sent, 1);

        // One second later the window still covers the lesson, but the
        // ledger already holds the row
        let second = scheduler.scan(now + Duration::seconds(1)).await.unwrap();
        assert_eq!(second.reminders_sent, 0);
        assert_eq!(second.duplicates_suppressed, 1);

        assert_eq!(outbox.count(), 2);
    }

    #[tokio::test]
    async fn test_past_lesson_never_fires() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let store = setup_lesson_store(
            vec![confirmed_lesson("lesson-1", now - Duration::minutes(5))],
            test_users(),
        );
        let mut conference = MockConference::new();
        conference.expect_is_configured().return_const(true);

        let (scheduler, ledger) =
            build_scheduler(store, setup_capturing_mail(&outbox), conference, &dir);
        let report = scheduler.scan(now).await.unwrap();

        assert_eq!(report.lessons_considered, 0);
        assert_eq!(report.reminders_sent, 0);
        assert_eq!(outbox.count(), 0);
        assert!(ledger.rows_for_lesson("lesson-1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lesson_beyond_horizon_is_not_considered() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let store = setup_lesson_store(
            vec![
                // Inside the horizon but outside both windows
                confirmed_lesson("lesson-near", now + Duration::minutes(90)),
                // Beyond the two-hour horizon entirely
                confirmed_lesson("lesson-far", now + Duration::minutes(150)),
            ],
            test_users(),
        );
        let mut conference = MockConference::new();
        conference.expect_is_configured().return_const(true);

        let (scheduler, _ledger) =
            build_scheduler(store, setup_capturing_mail(&outbox), conference, &dir);
        let report = scheduler.scan(now).await.unwrap();

        assert_eq!(report.lessons_considered, 1);
        assert_eq!(report.reminders_sent, 0);
        assert_eq!(outbox.count(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_generated_link() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let store = setup_lesson_store(
            vec![confirmed_lesson("lesson-1", now + Duration::seconds(30))],
            test_users(),
        );
        let mut conference = MockConference::new();
        conference.expect_is_configured().return_const(true);
        conference
            .expect_create_meeting()
            .times(1)
            .returning(|_| Err(ConferenceApiError::Unexpected { status: 500 }));

        let (scheduler, ledger) =
            build_scheduler(store, setup_capturing_mail(&outbox), conference, &dir);
        ledger
            .record(spent_row("lesson-1", ReminderWindow::OneHour))
            .unwrap();

        let report = scheduler.scan(now).await.unwrap();

        // The pass succeeds and the reminder still goes out
        assert_eq!(report.reminders_sent, 1);
        assert_eq!(report.sends_failed, 0);
        for body in outbox.bodies() {
            assert!(body.contains("Join here: https://meet.jit.si/lesson-mathematics-20250602-"));
        }

        let rows = ledger.rows_for_lesson("lesson-1").unwrap();
        let final_row = rows.iter().find(|r| r.window == "one_minute").unwrap();
        assert_eq!(final_row.link_source, "degraded");
        assert!(final_row.join_url.starts_with("https://meet.jit.si/"));
    }

    #[tokio::test]
    async fn test_scan_with_no_confirmed_lessons_touches_nothing() {
        let now = fixed_now();
        let dir = tempdir().unwrap();

        let store = setup_lesson_store(vec![], vec![]);
        // Zero expectations: any send or provision call would panic
        let mail = MockMail::new();
        let conference = MockConference::new();

        let (scheduler, _ledger) = build_scheduler(store, mail, conference, &dir);
        let report = scheduler.scan(now).await.unwrap();

        assert_eq!(report.lessons_considered, 0);
        assert_eq!(report.reminders_sent, 0);
        assert_eq!(report.sends_failed, 0);
        assert_eq!(report.lessons_skipped, 0);
        assert_eq!(report.duplicates_suppressed, 0);
    }

    #[tokio::test]
    async fn test_missing_user_skips_lesson_but_pass_continues() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let mut broken = confirmed_lesson("lesson-broken", now + Duration::minutes(45));
        broken.student_id = "missing".to_string();
        let healthy = confirmed_lesson("lesson-healthy", now + Duration::minutes(45));

        let store = setup_lesson_store(vec![broken, healthy], test_users());
        let mut conference = MockConference::new();
        conference.expect_is_configured().return_const(true);

        let (scheduler, ledger) =
            build_scheduler(store, setup_capturing_mail(&outbox), conference, &dir);
        let report = scheduler.scan(now).await.unwrap();

        assert_eq!(report.lessons_considered, 2);
        assert_eq!(report.lessons_skipped, 1);
        assert_eq!(report.reminders_sent, 1);

        // Only the healthy lesson reached the transport and the ledger
        assert_eq!(outbox.count(), 2);
        assert!(ledger.rows_for_lesson("lesson-broken").unwrap().is_empty());
        assert!(ledger.was_sent("lesson-healthy", ReminderWindow::OneHour).unwrap());
    }

    #[tokio::test]
    async fn test_unparseable_label_skips_lesson_but_pass_continues() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let mut garbled = confirmed_lesson("lesson-garbled", now + Duration::minutes(45));
        garbled.time = "noon".to_string();
        let healthy = confirmed_lesson("lesson-healthy", now + Duration::minutes(45));

        let store = setup_lesson_store(vec![garbled, healthy], test_users());
        let mut conference = MockConference::new();
        conference.expect_is_configured().return_const(true);

        let (scheduler, _ledger) =
            build_scheduler(store, setup_capturing_mail(&outbox), conference, &dir);
        let report = scheduler.scan(now).await.unwrap();

        // The garbled lesson never resolves to a start instant
        assert_eq!(report.lessons_considered, 1);
        assert_eq!(report.lessons_skipped, 1);
        assert_eq!(report.reminders_sent, 1);
        assert_eq!(outbox.count(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_aborts_the_pass() {
        let now = fixed_now();
        let dir = tempdir().unwrap();

        let mut store = MockLessonStore::new();
        store
            .expect_list_confirmed_lessons()
            .returning(|| Err(StoreError::Unexpected { status: 503 }));

        let (scheduler, _ledger) =
            build_scheduler(store, MockMail::new(), MockConference::new(), &dir);
        let err = scheduler.scan(now).await.unwrap_err();

        assert!(matches!(err, ScanError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_peek_reports_outlook_without_sending() {
        let now = fixed_now();
        let dir = tempdir().unwrap();

        let store = setup_lesson_store(
            vec![
                confirmed_lesson("lesson-soon", now + Duration::minutes(45)),
                confirmed_lesson("lesson-later", now + Duration::minutes(90)),
            ],
            test_users(),
        );
        // Zero expectations on both transports
        let mail = MockMail::new();
        let conference = MockConference::new();

        let (scheduler, ledger) = build_scheduler(store, mail, conference, &dir);
        let outlooks = scheduler.peek(now).await.unwrap();

        assert_eq!(outlooks.len(), 2);

        let soon = outlooks.iter().find(|o| o.lesson_id == "lesson-soon").unwrap();
        assert_eq!(soon.phase, LessonPhase::StartingSoon);
        assert_eq!(soon.starts_in, "44m");
        assert_eq!(soon.next_action, "one-hour reminder due");
        assert_eq!(soon.student_name, "Alice Johnson");
        assert!(!soon.one_hour_sent);

        let later = outlooks.iter().find(|o| o.lesson_id == "lesson-later").unwrap();
        assert_eq!(later.phase, LessonPhase::Upcoming);
        assert_eq!(later.next_action, "one-hour reminder in 29m");

        // After the hour window is spent the outlook points at the final one
        ledger
            .record(spent_row("lesson-soon", ReminderWindow::OneHour))
            .unwrap();
        let outlooks = scheduler.peek(now).await.unwrap();
        let soon = outlooks.iter().find(|o| o.lesson_id == "lesson-soon").unwrap();
        assert!(soon.one_hour_sent);
        assert_eq!(soon.next_action, "final reminder at one minute to start");
    }

    #[tokio::test]
    async fn test_manual_final_reminder_fires_and_respects_ledger() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let store = setup_lesson_store(
            vec![confirmed_lesson("lesson-1", now + Duration::minutes(30))],
            test_users(),
        );

        let (scheduler, ledger) = build_scheduler(
            store,
            setup_capturing_mail(&outbox),
            setup_live_conference(),
            &dir,
        );

        let outcome = scheduler.fire_final_reminder("lesson-1", now).await.unwrap();
        match outcome {
            FinalReminderOutcome::Sent { link, delivery } => {
                assert!(matches!(link, MeetingLink::Live(_)));
                assert!(delivery.all_ok());
            }
            other => panic!("expected Sent, got {:?}", other),
        }
        assert_eq!(outbox.count(), 2);
        for body in outbox.bodies() {
            assert!(body.contains("Join here:"));
        }
        assert!(ledger.was_sent("lesson-1", ReminderWindow::OneMinute).unwrap());

        // Firing again is refused by the ledger
        let outcome = scheduler.fire_final_reminder("lesson-1", now).await.unwrap();
        assert!(matches!(outcome, FinalReminderOutcome::AlreadySent));
        assert_eq!(outbox.count(), 2);
    }

    #[tokio::test]
    async fn test_manual_final_reminder_ignores_timing_windows() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        // Already started five minutes ago; the scan would skip it
        let store = setup_lesson_store(
            vec![confirmed_lesson("lesson-1", now - Duration::minutes(5))],
            test_users(),
        );

        let (scheduler, _ledger) = build_scheduler(
            store,
            setup_capturing_mail(&outbox),
            setup_live_conference(),
            &dir,
        );

        let outcome = scheduler.fire_final_reminder("lesson-1", now).await.unwrap();
        assert!(matches!(outcome, FinalReminderOutcome::Sent { .. }));
        assert_eq!(outbox.count(), 2);
    }

    #[tokio::test]
    async fn test_manual_final_reminder_edge_outcomes() {
        let now = fixed_now();
        let dir = tempdir().unwrap();

        let mut pending = confirmed_lesson("lesson-pending", now + Duration::minutes(30));
        pending.status = LessonStatus::Pending;
        let mut garbled = confirmed_lesson("lesson-garbled", now + Duration::minutes(30));
        garbled.time = "noon".to_string();

        let store = setup_lesson_store(vec![pending, garbled], test_users());
        let (scheduler, _ledger) =
            build_scheduler(store, MockMail::new(), MockConference::new(), &dir);

        let outcome = scheduler.fire_final_reminder("no-such-lesson", now).await.unwrap();
        assert!(matches!(outcome, FinalReminderOutcome::NotFound));

        let outcome = scheduler.fire_final_reminder("lesson-pending", now).await.unwrap();
        assert!(matches!(
            outcome,
            FinalReminderOutcome::NotConfirmed {
                status: LessonStatus::Pending
            }
        ));

        let outcome = scheduler.fire_final_reminder("lesson-garbled", now).await.unwrap();
        match outcome {
            FinalReminderOutcome::Unschedulable { reason } => {
                assert!(reason.contains("noon"));
            }
            other => panic!("expected Unschedulable, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_phase_boundaries() {
        assert_eq!(classify_phase(Duration::minutes(90)), LessonPhase::Upcoming);
        assert_eq!(classify_phase(Duration::minutes(61)), LessonPhase::Upcoming);
        assert_eq!(classify_phase(Duration::minutes(60)), LessonPhase::StartingSoon);
        assert_eq!(classify_phase(Duration::minutes(2)), LessonPhase::StartingSoon);
        assert_eq!(classify_phase(Duration::minutes(1)), LessonPhase::Imminent);
        assert_eq!(classify_phase(Duration::seconds(30)), LessonPhase::Imminent);
        assert_eq!(classify_phase(Duration::zero()), LessonPhase::Started);
        assert_eq!(classify_phase(Duration::minutes(-10)), LessonPhase::Started);
    }

    #[tokio::test]
    async fn test_degraded_link_without_provider_credentials() {
        let now = fixed_now();
        let dir = tempdir().unwrap();
        let outbox = MailDrop::new();

        let store = setup_lesson_store(
            vec![confirmed_lesson("lesson-1", now + Duration::seconds(30))],
            test_users(),
        );

        let (scheduler, ledger) = build_scheduler(
            store,
            setup_capturing_mail(&outbox),
            setup_offline_conference(),
            &dir,
        );
        ledger
            .record(spent_row("lesson-1", ReminderWindow::OneHour))
            .unwrap();

        let report = scheduler.scan(now).await.unwrap();
        assert_eq!(report.reminders_sent, 1);

        let rows = ledger.rows_for_lesson("lesson-1").unwrap();
        let final_row = rows.iter().find(|r| r.window == "one_minute").unwrap();
        assert_eq!(final_row.link_source, "degraded");
    }
}
