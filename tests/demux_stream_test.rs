//! Producer/consumer interleaving: consumers observe sink commits while the
//! document is still being fed.

use std::cell::RefCell;
use std::rc::Rc;

use jmux::{AwaitableValue, JsonDemux, StreamableValues};

jmux::jmux_schema! {
    pub struct Tokens {
        pub text: StreamableValues<String>,
    }
}

jmux::jmux_schema! {
    pub struct Report {
        pub population: AwaitableValue<i64>,
        pub summary: AwaitableValue<Option<String>>,
    }
}

jmux::jmux_schema! {
    pub struct Info {
        pub name: AwaitableValue<String>,
    }
}

jmux::jmux_schema! {
    pub struct Holder {
        pub info: AwaitableValue<Rc<Info>>,
    }
}

#[tokio::test]
async fn characters_stream_while_the_producer_is_still_feeding() {
    let tokens = Rc::new(Tokens::default());
    let mut demux = JsonDemux::new(Rc::clone(&tokens));
    let log = RefCell::new(Vec::<String>::new());

    let producer = async {
        for ch in r#"{"text":"hi there"}"#.chars() {
            demux.feed_char(ch).unwrap();
            log.borrow_mut().push(format!("fed {ch:?}"));
            tokio::task::yield_now().await;
        }
    };
    let consumer = async {
        while let Some(chunk) = tokens.text.next().await {
            log.borrow_mut().push(format!("got {chunk:?}"));
        }
    };
    tokio::join!(producer, consumer);

    let log = log.into_inner();
    let first_char_seen = log
        .iter()
        .position(|entry| entry == "got \"h\"")
        .expect("consumer never saw the first character");
    let last_char_fed = log
        .iter()
        .position(|entry| entry == "fed '}'")
        .expect("producer never finished");
    assert!(
        first_char_seen < last_char_fed,
        "consumer should run ahead of the closing brace: {log:?}"
    );
}

#[tokio::test]
async fn awaitable_resolves_before_the_document_ends() {
    let report = Rc::new(Report::default());
    let mut demux = JsonDemux::new(Rc::clone(&report));
    let log = RefCell::new(Vec::<&'static str>::new());

    let producer = async {
        for ch in r#"{"population":2148000,"summary":"a long trailing field"}"#.chars() {
            demux.feed_char(ch).unwrap();
            tokio::task::yield_now().await;
        }
        log.borrow_mut().push("producer done");
    };
    let consumer = async {
        let population = report.population.get().await;
        log.borrow_mut().push("population resolved");
        population
    };

    let ((), population) = tokio::join!(producer, consumer);
    assert_eq!(population, 2_148_000);

    let log = log.into_inner();
    assert_eq!(log, ["population resolved", "producer done"]);
}

#[tokio::test]
async fn nested_schema_is_consumable_while_it_is_being_filled() {
    let holder = Rc::new(Holder::default());
    let mut demux = JsonDemux::new(Rc::clone(&holder));

    let producer = async {
        for ch in r#"{"info":{"name":"IDF"}}"#.chars() {
            demux.feed_char(ch).unwrap();
            tokio::task::yield_now().await;
        }
    };
    let consumer = async {
        // The nested instance is committed on its opening brace; its own
        // fields resolve as they arrive.
        let info = holder.info.get().await;
        info.name.get().await
    };

    let ((), name) = tokio::join!(producer, consumer);
    assert_eq!(name, "IDF");
}

#[tokio::test]
async fn consumer_may_start_before_any_input() {
    let tokens = Rc::new(Tokens::default());
    let mut demux = JsonDemux::new(Rc::clone(&tokens));

    let consumer = async {
        let mut all = String::new();
        while let Some(chunk) = tokens.text.next().await {
            all.push_str(&chunk);
        }
        all
    };
    let producer = async {
        tokio::task::yield_now().await;
        demux.feed_chunks(r#"{"text":"late"}"#).unwrap();
    };

    let (all, ()) = tokio::join!(consumer, producer);
    assert_eq!(all, "late");
}

#[tokio::test]
async fn producer_is_never_blocked_by_a_missing_consumer() {
    let tokens = Rc::new(Tokens::default());
    let mut demux = JsonDemux::new(Rc::clone(&tokens));
    // No consumer at all: the unbounded queue absorbs every commit.
    demux.feed_chunks(r#"{"text":"unobserved"}"#).unwrap();
    assert!(demux.is_complete());

    let mut collected = String::new();
    while let Some(chunk) = tokens.text.next().await {
        collected.push_str(&chunk);
    }
    assert_eq!(collected, "unobserved");
}
