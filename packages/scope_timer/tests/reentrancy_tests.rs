//! Export callbacks that use the stopwatch they are attached to, reached via a thread-local.

use std::cell::RefCell;

use scope_timer::{ManualClock, RoundPhase, Stopwatch};

thread_local! {
    static EXPORTED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static TRACED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };

    static STOPWATCH: Stopwatch<ManualClock> = Stopwatch::builder()
        .clock(ManualClock::new())
        .export_aggregated(|report| {
            let root = report.root_name().to_owned();
            EXPORTED.with(|exported| exported.borrow_mut().push(root));

            // Measuring the export itself completes another round from inside this callback.
            if report.root_name() == "outer" {
                STOPWATCH.with(|stopwatch| {
                    stopwatch.enter("nested_round");
                    stopwatch.exit()
                })?;
            }

            Ok(())
        })
        .export_tracing(|report| {
            let root = report.root_name().to_owned();
            TRACED.with(|traced| traced.borrow_mut().push(root));
            Ok(())
        })
        .build();
}

fn exported() -> Vec<String> {
    EXPORTED.with(|exported| exported.borrow().clone())
}

fn traced() -> Vec<String> {
    TRACED.with(|traced| traced.borrow().clone())
}

#[test]
fn round_completed_inside_exporter_is_exported_exactly_once() {
    let exit = STOPWATCH.with(|stopwatch| {
        stopwatch.enter("outer");
        stopwatch.exit().unwrap()
    });

    assert!(exit.completed_round());
    assert!(exit.export_failures().is_empty());

    assert_eq!(exported(), ["outer", "nested_round"]);
    assert_eq!(traced(), ["outer", "nested_round"]);

    STOPWATCH.with(|stopwatch| {
        assert_eq!(stopwatch.phase(), RoundPhase::Idle);
        assert_eq!(
            stopwatch.last_aggregated_report().unwrap().root_name(),
            "nested_round"
        );
    });
}

#[test]
fn later_rounds_are_unaffected_by_nested_completion() {
    STOPWATCH.with(|stopwatch| {
        stopwatch.enter("outer");
        stopwatch.exit().unwrap();

        {
            let _root = stopwatch.timer("plain");
        }
    });

    assert_eq!(exported(), ["outer", "nested_round", "plain"]);
    assert_eq!(traced(), ["outer", "nested_round", "plain"]);
}
