use std::cell::RefCell;
use std::io::Write;
use std::pin::pin;
use std::rc::Rc;
use std::time::Duration;

use futures::poll;
use pgpoll::{ConnectOptions, ConnectionState, CursorOptions, Error, PollStatus, TokioReactor};
use pgpoll_test::{setup_if_needed, Script, ScriptedConnector};
use tokio::task::LocalSet;

#[tokio::test]
async fn it_connects_and_waits_for_readable() -> anyhow::Result<()> {
    setup_if_needed();

    LocalSet::new()
        .run_until(async {
            let script = Script::new();
            script.then(PollStatus::Write).then(PollStatus::Ok);

            let connector = ScriptedConnector::new(&script);
            let reactor = Rc::new(TokioReactor::new());

            let conn = pgpoll::open(&connector, &ConnectOptions::new(), reactor.clone()).await?;

            assert_eq!(script.polls(), 2);
            assert_eq!(reactor.registered(), 0);

            script.then(PollStatus::Read).then(PollStatus::Ok);

            let mut peer = script.take_peer().expect("socket peer already taken");
            let mut cursor = pin!(conn.cursor(CursorOptions::new().name("portal")));

            assert!(poll!(&mut cursor).is_pending());
            assert_eq!(conn.state(), ConnectionState::AwaitingReadable);
            assert_eq!(reactor.registered(), 1);

            // the "server" answers
            peer.write_all(b"Z")?;

            let cursor = cursor.await?;

            assert_eq!(cursor.name(), Some("portal"));
            assert_eq!(conn.state(), ConnectionState::Idle);
            assert_eq!(reactor.registered(), 0);
            assert_eq!(script.polls(), 4);

            Ok::<_, anyhow::Error>(())
        })
        .await
}

#[tokio::test]
async fn it_cancels_registrations_on_close() -> anyhow::Result<()> {
    setup_if_needed();

    LocalSet::new()
        .run_until(async {
            let script = Script::new();
            let connector = ScriptedConnector::new(&script);
            let reactor = Rc::new(TokioReactor::new());

            let conn = pgpoll::open(&connector, &ConnectOptions::new(), reactor.clone()).await?;

            script.then(PollStatus::Read);

            let mut cursor = pin!(conn.cursor(CursorOptions::new()));

            assert!(poll!(&mut cursor).is_pending());
            assert_eq!(reactor.registered(), 1);

            conn.close();

            assert_eq!(reactor.registered(), 0);
            assert!(matches!(cursor.await, Err(Error::ConnectionClosed)));

            Ok::<_, anyhow::Error>(())
        })
        .await
}

#[tokio::test]
async fn it_deregisters_after_a_timeout() -> anyhow::Result<()> {
    setup_if_needed();

    LocalSet::new()
        .run_until(async {
            let script = Script::new();
            let connector = ScriptedConnector::new(&script);
            let reactor = Rc::new(TokioReactor::new());

            let conn = pgpoll::open(&connector, &ConnectOptions::new(), reactor.clone()).await?;

            script.then(PollStatus::Read);

            let res = pgpoll::rt::timeout(
                Duration::from_millis(20),
                conn.cursor(CursorOptions::new()),
            )
            .await;

            assert!(res.is_err());
            assert_eq!(reactor.registered(), 0);
            assert_eq!(conn.state(), ConnectionState::Idle);

            conn.cursor(CursorOptions::new()).await?;

            Ok::<_, anyhow::Error>(())
        })
        .await
}

#[tokio::test]
async fn it_hands_fatal_errors_to_the_sink() -> anyhow::Result<()> {
    setup_if_needed();

    LocalSet::new()
        .run_until(async {
            let reports = Rc::new(RefCell::new(Vec::new()));

            let script = Script::new();
            script.then(PollStatus::Write).then(PollStatus::Unknown(9));

            let connector = ScriptedConnector::new(&script);
            let reactor = Rc::new(TokioReactor::with_error_sink({
                let reports = Rc::clone(&reports);
                move |error| reports.borrow_mut().push(error)
            }));

            let err = pgpoll::open(&connector, &ConnectOptions::new(), reactor.clone())
                .await
                .unwrap_err();

            assert!(matches!(err, Error::ConnectionClosed));
            assert!(script.is_closed());
            assert_eq!(reactor.registered(), 0);

            let reports = reports.borrow();

            assert_eq!(reports.len(), 1);
            assert!(matches!(reports[0].error, Error::UnknownReadinessState(9)));

            Ok::<_, anyhow::Error>(())
        })
        .await
}
