use docdesk_db::Database;
use docdesk_db::models::MessageFilter;
use docdesk_types::models::{MessageType, Priority, Role};

struct Fixture {
    db: Database,
    admin: i64,
    users: Vec<i64>,
}

fn fixture(user_count: usize) -> Fixture {
    let db = Database::open_in_memory().unwrap();
    let admin = db
        .create_user("Admin", "admin@example.com", "hash", Role::Admin)
        .unwrap();
    let users = (0..user_count)
        .map(|i| {
            let email = format!("user{i}@example.com");
            db.create_user(&email, &email, "hash", Role::User).unwrap()
        })
        .collect();
    Fixture { db, admin, users }
}

#[test]
fn broadcast_creates_one_row_per_regular_user() {
    let f = fixture(3);
    // A second admin must not receive the broadcast.
    f.db.create_user("Admin 2", "admin2@example.com", "hash", Role::Admin)
        .unwrap();

    let count = f
        .db
        .insert_broadcast(f.admin, "Maintenance", "Down at noon", Priority::Urgent)
        .unwrap();
    assert_eq!(count, 3);

    for user in &f.users {
        let (rows, total) = f.db.list_inbox(*user, false, 20, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].message_type, MessageType::AdminBroadcast.as_str());
        assert_eq!(rows[0].priority, "urgent");
        assert_eq!(rows[0].sender.as_ref().unwrap().id, f.admin);
        assert!(!rows[0].is_read);
    }

    let (_, admin_inbox) = f.db.list_inbox(f.admin, false, 20, 0).unwrap();
    assert_eq!(admin_inbox, 0);
}

#[test]
fn broadcast_rows_are_read_independently() {
    let f = fixture(2);
    f.db.insert_broadcast(f.admin, "s", "c", Priority::Medium)
        .unwrap();

    let (first_inbox, _) = f.db.list_inbox(f.users[0], false, 20, 0).unwrap();
    assert!(f.db.mark_message_read(first_inbox[0].id).unwrap());

    let (unread_first, _) = f.db.list_inbox(f.users[0], true, 20, 0).unwrap();
    let (unread_second, _) = f.db.list_inbox(f.users[1], true, 20, 0).unwrap();
    assert!(unread_first.is_empty());
    assert_eq!(unread_second.len(), 1);
}

#[test]
fn broadcast_with_no_recipients_is_empty() {
    let f = fixture(0);
    assert_eq!(
        f.db.insert_broadcast(f.admin, "s", "c", Priority::Low).unwrap(),
        0
    );
}

#[test]
fn mark_read_stamps_read_at_only_once() {
    let f = fixture(1);
    let id = f
        .db
        .insert_message(f.admin, f.users[0], "s", "c", MessageType::AdminToUser, Priority::Medium)
        .unwrap();

    assert!(f.db.mark_message_read(id).unwrap());
    let first = f.db.get_message(id).unwrap().unwrap();
    assert!(first.is_read);
    let stamped = first.read_at.clone().unwrap();

    std::thread::sleep(std::time::Duration::from_millis(2));
    assert!(!f.db.mark_message_read(id).unwrap());
    let second = f.db.get_message(id).unwrap().unwrap();
    assert_eq!(second.read_at.as_deref(), Some(stamped.as_str()));
}

#[test]
fn get_message_joins_both_parties() {
    let f = fixture(1);
    let id = f
        .db
        .insert_message(f.users[0], f.admin, "s", "c", MessageType::UserToAdmin, Priority::High)
        .unwrap();

    let row = f.db.get_message(id).unwrap().unwrap();
    assert_eq!(row.sender.unwrap().id, f.users[0]);
    let receiver = row.receiver.unwrap();
    assert_eq!(receiver.id, f.admin);
    assert_eq!(receiver.role, "admin");
}

#[test]
fn inbox_pages_newest_first_with_total() {
    let f = fixture(1);
    let ids: Vec<i64> = (0..5)
        .map(|i| {
            f.db.insert_message(
                f.admin,
                f.users[0],
                &format!("s{i}"),
                "c",
                MessageType::AdminToUser,
                Priority::Medium,
            )
            .unwrap()
        })
        .collect();

    let (page1, total) = f.db.list_inbox(f.users[0], false, 2, 0).unwrap();
    assert_eq!(total, 5);
    assert_eq!(page1.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);

    let (page3, _) = f.db.list_inbox(f.users[0], false, 2, 4).unwrap();
    assert_eq!(page3.len(), 1);
    assert_eq!(page3[0].id, ids[0]);
}

#[test]
fn sent_lists_only_own_messages() {
    let f = fixture(2);
    f.db.insert_message(f.users[0], f.admin, "a", "c", MessageType::UserToAdmin, Priority::Low)
        .unwrap();
    f.db.insert_message(f.users[1], f.admin, "b", "c", MessageType::UserToAdmin, Priority::Low)
        .unwrap();

    let (rows, total) = f.db.list_sent(f.users[0], 20, 0).unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].subject, "a");
}

#[test]
fn admin_listing_filters_unread_and_priority() {
    let f = fixture(1);
    let low = f
        .db
        .insert_message(f.users[0], f.admin, "low", "c", MessageType::UserToAdmin, Priority::Low)
        .unwrap();
    f.db.insert_message(f.users[0], f.admin, "urgent", "c", MessageType::UserToAdmin, Priority::Urgent)
        .unwrap();
    f.db.mark_message_read(low).unwrap();

    let (_, all) = f.db.list_messages(MessageFilter::default(), 50, 0).unwrap();
    assert_eq!(all, 2);

    let unread = MessageFilter {
        unread_only: true,
        priority: None,
    };
    let (rows, total) = f.db.list_messages(unread, 50, 0).unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].subject, "urgent");

    let low_only = MessageFilter {
        unread_only: false,
        priority: Some("low"),
    };
    let (rows, _) = f.db.list_messages(low_only, 50, 0).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, low);
}

#[test]
fn delete_message_removes_the_row() {
    let f = fixture(1);
    let id = f
        .db
        .insert_message(f.users[0], f.admin, "s", "c", MessageType::UserToAdmin, Priority::Low)
        .unwrap();
    assert!(f.db.delete_message(id).unwrap());
    assert!(!f.db.delete_message(id).unwrap());
}
