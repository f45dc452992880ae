//! End-to-end routing scenarios driven through the public crate API.

use parley::backend::chat::render::PlainRenderer;
use parley::backend::chat::router::MessageRouter;
use parley::backend::chat::session::ConnectionId;
use parley::backend::store::memory::{
    MemoryAttachmentStore, MemoryMessageStore, MemoryUnreadLedger, MemoryUserDirectory,
};
use parley::backend::store::{UnreadLedger, UserDirectory};
use parley::shared::frame::{Command, Push};
use parley::shared::user::{Peer, User, BROADCAST_USERNAME};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

struct TestServer {
    router: MessageRouter,
    users: Arc<MemoryUserDirectory>,
    unread: Arc<MemoryUnreadLedger>,
}

async fn server_with(usernames: &[(&str, &str)]) -> TestServer {
    let users = Arc::new(MemoryUserDirectory::new());
    users
        .insert(&User::new(BROADCAST_USERNAME, "Broadcast", ""))
        .await
        .unwrap();
    for (username, firstname) in usernames {
        users
            .insert(&User::new(*username, *firstname, "Example"))
            .await
            .unwrap();
    }
    let unread = Arc::new(MemoryUnreadLedger::new());
    let router = MessageRouter::new(
        users.clone(),
        Arc::new(MemoryMessageStore::new()),
        unread.clone(),
        Arc::new(MemoryAttachmentStore::new()),
        Arc::new(PlainRenderer::new()),
        20,
    );
    TestServer {
        router,
        users,
        unread,
    }
}

impl TestServer {
    async fn connect(&self, username: &str) -> (ConnectionId, UnboundedReceiver<Push>) {
        let user = self.users.find(username).await.unwrap().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        self.router.connect(id, user, tx).await.unwrap();
        drain(&mut rx);
        (id, rx)
    }

    async fn change_page(&self, conn: ConnectionId, rx: &mut UnboundedReceiver<Push>, to: &str) {
        self.router
            .handle(
                conn,
                Command::ChangePage {
                    peer: Peer::from_username(to),
                },
            )
            .await
            .unwrap();
        drain(rx);
    }

    async fn send(&self, conn: ConnectionId, body: &str) {
        self.router
            .handle(
                conn,
                Command::Send {
                    body: body.to_string(),
                },
            )
            .await
            .unwrap();
    }
}

fn drain(rx: &mut UnboundedReceiver<Push>) -> Vec<Push> {
    let mut pushes = Vec::new();
    while let Ok(push) = rx.try_recv() {
        pushes.push(push);
    }
    pushes
}

fn message_bodies(pushes: &[Push]) -> Vec<String> {
    pushes
        .iter()
        .filter_map(|p| match p {
            Push::Msg(fragment) => Some(fragment.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn broadcast_from_a_reaches_b_and_c_live() {
    // Users A, B, C connected, all viewing broadcast. A sends "hi":
    // everyone sees it rendered once and no counters move.
    let server = server_with(&[("a", "Ada"), ("b", "Ben"), ("c", "Cat")]).await;
    let (a, mut a_rx) = server.connect("a").await;
    let (_b, mut b_rx) = server.connect("b").await;
    let (_c, mut c_rx) = server.connect("c").await;
    drain(&mut a_rx);

    server.send(a, "hi").await;

    let a_msgs = message_bodies(&drain(&mut a_rx));
    assert_eq!(a_msgs.len(), 1);
    assert!(a_msgs[0].contains("me: hi"));

    for rx in [&mut b_rx, &mut c_rx] {
        let msgs = message_bodies(&drain(rx));
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("Ada Example: hi"));
    }
    assert_eq!(server.unread.get("b", "a").await.unwrap(), 0);
    assert_eq!(server.unread.get("c", "a").await.unwrap(), 0);
}

#[tokio::test]
async fn broadcast_bumps_recipient_viewing_the_sender_directly() {
    // A viewing broadcast, B connected but viewing A's direct page: the
    // broadcast send gives B only a list refresh and one unread from A.
    let server = server_with(&[("a", "Ada"), ("b", "Ben"), ("c", "Cat")]).await;
    let (a, mut a_rx) = server.connect("a").await;
    let (b, mut b_rx) = server.connect("b").await;
    server.change_page(b, &mut b_rx, "a").await;
    drain(&mut a_rx);

    server.send(a, "hello everyone").await;

    let b_pushes = drain(&mut b_rx);
    assert!(message_bodies(&b_pushes).is_empty());
    assert!(matches!(b_pushes.as_slice(), [Push::Users(_)]));
    assert_eq!(server.unread.get("b", "a").await.unwrap(), 1);
    // Offline C accumulates as well, silently
    assert_eq!(server.unread.get("c", "a").await.unwrap(), 1);
}

#[tokio::test]
async fn direct_conversation_lifecycle() {
    let server = server_with(&[("alice", "Alice"), ("bob", "Bob")]).await;
    let (alice, mut alice_rx) = server.connect("alice").await;
    let (bob, mut bob_rx) = server.connect("bob").await;

    // Alice opens Bob's page and writes twice while Bob idles on broadcast
    server.change_page(alice, &mut alice_rx, "bob").await;
    server.send(alice, "are you there?").await;
    server.send(alice, "ping me back").await;
    drain(&mut alice_rx);
    assert_eq!(server.unread.get("bob", "alice").await.unwrap(), 2);

    // Bob opens Alice's page: the badge resets, the history arrives
    server
        .router
        .handle(
            bob,
            Command::ChangePage {
                peer: Peer::from_username("alice"),
            },
        )
        .await
        .unwrap();
    let pushes = drain(&mut bob_rx);
    assert_eq!(server.unread.get("bob", "alice").await.unwrap(), 0);
    let page = pushes
        .iter()
        .find_map(|p| match p {
            Push::Page(fragment) => Some(fragment.clone()),
            _ => None,
        })
        .expect("history page push");
    let first = page.find("are you there?").unwrap();
    let second = page.find("ping me back").unwrap();
    assert!(first < second);

    // Now both view each other: messages flow live in both directions
    server.send(bob, "here now").await;
    let alice_msgs = message_bodies(&drain(&mut alice_rx));
    assert_eq!(alice_msgs.len(), 1);
    assert!(alice_msgs[0].contains("Bob Example: here now"));
    assert_eq!(server.unread.get("alice", "bob").await.unwrap(), 0);
}

#[tokio::test]
async fn account_deletion_leaves_no_trace() {
    let server = server_with(&[("alice", "Alice"), ("bob", "Bob")]).await;
    let (alice, mut alice_rx) = server.connect("alice").await;
    let (bob, mut bob_rx) = server.connect("bob").await;
    server.change_page(alice, &mut alice_rx, "bob").await;
    server.send(alice, "soon gone").await;
    server.change_page(bob, &mut bob_rx, "alice").await;

    server.users.remove("alice").await.unwrap();
    server.router.notify_account_deleted("alice").await.unwrap();

    assert_eq!(drain(&mut alice_rx), vec![Push::Redirect("/".to_string())]);
    assert_eq!(server.unread.get("bob", "alice").await.unwrap(), 0);
    // Bob fell back to broadcast and got the shrunken list
    let pushes = drain(&mut bob_rx);
    let list = pushes
        .iter()
        .find_map(|p| match p {
            Push::Users(fragment) => Some(fragment.clone()),
            _ => None,
        })
        .expect("refreshed user list");
    assert!(!list.contains("(alice)"));
    assert!(list.starts_with("> Broadcast"));
}
