mod common;

use chrono::{Duration, Utc};
use common::{fresh_db, signup_n};
use uuid::Uuid;
use warbler_db::{DEFAULT_TIMELINE_LIMIT, Error, NewMessage};
use warbler_types::ProfileStats;

#[test]
fn message_belongs_to_its_author() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);

    let mut session = db.session();
    let first = session.post_message(u1.id, "hi, this is a test").unwrap();
    session.add_message(
        NewMessage::new(u1.id, "Does basic model work?").at(Utc::now() + Duration::seconds(1)),
    );
    session.commit().unwrap();

    let stored = db.get_message(first.id).unwrap().unwrap();
    assert_eq!(stored, first.to_message());
    assert_eq!(stored.user_id, u1.id);

    let messages = db.messages_for_user(u1.id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "Does basic model work?");
    assert_eq!(messages[1].text, "hi, this is a test");
}

#[test]
fn message_author_must_exist() {
    let db = fresh_db();

    let mut session = db.session();
    session.add_message(NewMessage::new(Uuid::new_v4(), "orphan"));

    assert!(session.commit().unwrap_err().is_integrity());
}

#[test]
fn author_and_message_can_be_staged_together_in_any_order() {
    let db = fresh_db();
    let author = warbler_db::NewUser::new("author", "author@test.com", "pw");

    let mut session = db.session();
    session.add_message(NewMessage::new(author.id, "first post"));
    session.add_user(author.clone());
    assert_eq!(session.len(), 2);
    session.commit().unwrap();

    assert_eq!(db.messages_for_user(author.id).unwrap().len(), 1);
}

#[test]
fn bad_message_text_is_rejected_up_front() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);
    let mut session = db.session();

    assert!(matches!(session.post_message(u1.id, ""), Err(Error::Validation(_))));
    assert!(matches!(
        session.post_message(u1.id, &"x".repeat(141)),
        Err(Error::Validation(_))
    ));
    assert!(session.is_empty());
}

#[test]
fn overlong_text_staged_directly_fails_at_commit() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);

    let mut session = db.session();
    session.add_message(NewMessage::new(u1.id, "x".repeat(141)));

    assert!(session.commit().unwrap_err().is_integrity());
}

#[test]
fn liking_a_message_records_one_row() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);
    let u2 = signup_n(&db, 2);

    let mut session = db.session();
    let m1 = session.post_message(u1.id, "hi, this is a test").unwrap();
    session.commit().unwrap();

    let mut session = db.session();
    let like_id = session.like(u2.id, m1.id);
    session.commit().unwrap();

    let likes = db.likes_for_user(u2.id).unwrap();
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].id, like_id);
    assert_eq!(likes[0].user_id, u2.id);
    assert_eq!(likes[0].message_id, m1.id);

    let liked = db.liked_messages(u2.id).unwrap();
    assert_eq!(liked, vec![m1.to_message()]);
}

#[test]
fn liking_twice_is_an_integrity_error() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);
    let u2 = signup_n(&db, 2);

    let mut session = db.session();
    let m1 = session.post_message(u1.id, "like me").unwrap();
    session.like(u2.id, m1.id);
    session.commit().unwrap();

    let mut session = db.session();
    session.like(u2.id, m1.id);
    assert!(session.commit().unwrap_err().is_integrity());
    assert_eq!(db.likes_for_user(u2.id).unwrap().len(), 1);
}

#[test]
fn toggle_like_adds_then_removes() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);
    let u2 = signup_n(&db, 2);

    let mut session = db.session();
    let m1 = session.post_message(u1.id, "toggle").unwrap();
    session.commit().unwrap();

    assert!(db.toggle_like(u2.id, m1.id).unwrap());
    assert_eq!(db.likes_for_user(u2.id).unwrap().len(), 1);

    assert!(!db.toggle_like(u2.id, m1.id).unwrap());
    assert!(db.likes_for_user(u2.id).unwrap().is_empty());
}

#[test]
fn toggle_like_rejects_own_and_missing_messages() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);

    let mut session = db.session();
    let m1 = session.post_message(u1.id, "mine").unwrap();
    session.commit().unwrap();

    assert!(db.toggle_like(u1.id, m1.id).unwrap_err().is_validation());
    assert!(matches!(
        db.toggle_like(u1.id, Uuid::new_v4()),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn profile_stats_count_messages_follows_and_likes() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);
    let u2 = signup_n(&db, 2);
    let u3 = signup_n(&db, 3);

    let mut session = db.session();
    let m1 = NewMessage::new(u1.id, "test message1");
    let m2 = NewMessage::new(u2.id, "test message2");
    let m3 = NewMessage::new(u3.id, "test message3");
    session
        .add_message(m1.clone())
        .add_message(m2.clone())
        .add_message(m3.clone());
    session.like(u1.id, m2.id);
    session.like(u2.id, m3.id);
    session.like(u3.id, m1.id);
    session.follow(u1.id, u2.id).follow(u1.id, u3.id);
    session.commit().unwrap();

    let profile = db.profile(u1.id).unwrap().unwrap();
    assert_eq!(profile.user.username, "testuser1");
    assert_eq!(
        profile.stats,
        ProfileStats { messages: 1, followers: 0, following: 2, likes: 1 }
    );

    assert_eq!(db.profile_stats(u2.id).unwrap().followers, 1);
    assert!(db.profile(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn timeline_shows_own_and_followed_messages_newest_first() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);
    let u2 = signup_n(&db, 2);
    let u3 = signup_n(&db, 3);
    let base = Utc::now();

    let mut session = db.session();
    session
        .add_message(NewMessage::new(u1.id, "mine").at(base))
        .add_message(NewMessage::new(u2.id, "followed").at(base + Duration::seconds(1)))
        .add_message(NewMessage::new(u3.id, "stranger").at(base + Duration::seconds(2)))
        .follow(u1.id, u2.id);
    session.commit().unwrap();

    let texts: Vec<_> = db
        .timeline(u1.id, DEFAULT_TIMELINE_LIMIT)
        .unwrap()
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, vec!["followed", "mine"]);

    assert_eq!(db.timeline(u1.id, 1).unwrap().len(), 1);
}

#[test]
fn equal_timestamps_list_latest_insert_first() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);
    let u2 = signup_n(&db, 2);
    let at = Utc::now();

    let mut session = db.session();
    session.follow(u1.id, u2.id);
    for text in ["one", "two", "three"] {
        session.add_message(NewMessage::new(u2.id, text).at(at));
    }
    session.commit().unwrap();

    let mut session = db.session();
    for message in db.messages_for_user(u2.id).unwrap() {
        session.like(u1.id, message.id);
    }
    session.commit().unwrap();

    let texts = |messages: Vec<warbler_types::Message>| -> Vec<String> {
        messages.into_iter().map(|m| m.text).collect()
    };
    let expected = vec!["three", "two", "one"];
    assert_eq!(texts(db.messages_for_user(u2.id).unwrap()), expected);
    assert_eq!(texts(db.timeline(u1.id, DEFAULT_TIMELINE_LIMIT).unwrap()), expected);
    assert_eq!(texts(db.liked_messages(u1.id).unwrap()), expected);
}

#[test]
fn deleting_a_user_cascades() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);
    let u2 = signup_n(&db, 2);

    let mut session = db.session();
    let m1 = session.post_message(u1.id, "soon gone").unwrap();
    let m2 = session.post_message(u2.id, "stays").unwrap();
    session.like(u2.id, m1.id);
    session.like(u1.id, m2.id);
    session.follow(u1.id, u2.id).follow(u2.id, u1.id);
    session.commit().unwrap();

    db.delete_user(u1.id).unwrap();

    assert!(db.get_user(u1.id).unwrap().is_none());
    assert!(db.get_message(m1.id).unwrap().is_none());
    assert!(db.get_message(m2.id).unwrap().is_some());
    assert!(db.likes_for_user(u2.id).unwrap().is_empty());
    assert_eq!(
        db.profile_stats(u2.id).unwrap(),
        ProfileStats { messages: 1, followers: 0, following: 0, likes: 0 }
    );
}

#[test]
fn deleting_a_missing_row_is_not_found() {
    let db = fresh_db();

    assert!(matches!(db.delete_user(Uuid::new_v4()), Err(Error::NotFound(_))));

    let mut session = db.session();
    session.delete_message(Uuid::new_v4());
    assert!(matches!(session.commit(), Err(Error::NotFound(_))));
}

#[test]
fn unfollow_and_unlike_remove_edges() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);
    let u2 = signup_n(&db, 2);

    let mut session = db.session();
    let m2 = session.post_message(u2.id, "hello").unwrap();
    session.follow(u1.id, u2.id);
    session.like(u1.id, m2.id);
    session.commit().unwrap();

    let mut session = db.session();
    session.unfollow(u1.id, u2.id).unlike(u1.id, m2.id);
    session.commit().unwrap();

    assert!(!db.is_following(u1.id, u2.id).unwrap());
    assert!(db.likes_for_user(u1.id).unwrap().is_empty());
}

#[test]
fn rollback_discards_staged_writes() {
    let db = fresh_db();
    let u1 = signup_n(&db, 1);

    let mut session = db.session();
    session.post_message(u1.id, "never saved").unwrap();
    session.rollback();

    assert!(db.messages_for_user(u1.id).unwrap().is_empty());
}
