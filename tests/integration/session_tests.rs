//! Session-level tests for co-execution, solo-tail exclusion, and failures.

use std::sync::Arc;
use std::time::Duration;

use coslowdown::orchestrator::runner::RunnerExit;
use coslowdown::orchestrator::session_manager::SessionOrchestrator;
use coslowdown::AppError;

use super::test_helpers::{pair, solo, ScriptedLauncher, SpyAllocator};

const ONE_SECOND: Duration = Duration::from_secs(1);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pair_with_constant_runtimes_completes() {
    let launcher = ScriptedLauncher::constant(ONE_SECOND);
    let orchestrator = SessionOrchestrator::new(launcher.clone());

    let outcome = orchestrator
        .run_session(&pair(5, 0.0001, (0, 0)))
        .await
        .expect("session succeeds");

    assert_eq!(outcome.completed, 2);
    assert_eq!(outcome.reports.len(), 2);
    for report in &outcome.reports {
        assert_eq!(report.exit, RunnerExit::SessionComplete);
        assert_eq!(report.converged_at, Some(5));
        assert!(report.samples.len() >= 5, "first five iterations are co-located");
        assert!(
            report.iterations as usize - report.samples.len() <= 1,
            "at most the in-flight iteration is solo-tail"
        );
        assert!(report.samples.iter().all(|d| *d == ONE_SECOND));
    }
    assert_eq!(outcome.samples()[0].len(), outcome.reports[0].samples.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn converged_runner_keeps_running_until_partner_converges() {
    // A converges at iteration 3; B drifts until iteration 20, then settles.
    let launcher = ScriptedLauncher::new(|workload, iteration| {
        let secs = match workload {
            0 => 1.0,
            _ if iteration < 20 => f64::from(iteration),
            _ => 20.0,
        };
        Ok(Duration::from_secs_f64(secs))
    });
    let orchestrator = SessionOrchestrator::new(launcher.clone());

    let outcome = orchestrator
        .run_session(&pair(3, 0.0001, (0, 0)))
        .await
        .expect("session succeeds");

    let a = &outcome.reports[0];
    let b = &outcome.reports[1];
    assert_eq!(a.converged_at, Some(3));
    let b_converged = b.converged_at.expect("b converges once it settles");
    assert!(b_converged > 20);

    // B's converging iteration closed the session, so all of B is reported.
    assert_eq!(u32::try_from(b.samples.len()).expect("small"), b.iterations);
    assert_eq!(b.iterations, b_converged);
    // A kept iterating after its own convergence.
    assert!(a.iterations > 3);
    assert!(a.iterations - u32::try_from(a.samples.len()).expect("small") <= 1);
    assert_eq!(launcher.iterations_of(0), a.iterations as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn only_the_tail_after_completion_is_excluded() {
    // Durations encode the iteration in their nanoseconds so reported
    // samples can be traced back. The nanosecond offsets keep the variance
    // far below the tolerance; B alternates until iteration 12 to settle later.
    let launcher = ScriptedLauncher::new(|workload, iteration| {
        let base = if workload == 1 && iteration % 2 == 0 && iteration < 12 {
            2
        } else {
            1
        };
        Ok(Duration::from_secs(base) + Duration::from_nanos(u64::from(iteration)))
    });
    let orchestrator = SessionOrchestrator::new(launcher.clone());
    let outcome = orchestrator
        .run_session(&pair(4, 0.0001, (0, 0)))
        .await
        .expect("session succeeds");

    assert_eq!(outcome.completed, 2);
    for report in &outcome.reports {
        let traced: Vec<u32> = report.samples.iter().map(Duration::subsec_nanos).collect();
        let expected: Vec<u32> = (1..=u32::try_from(traced.len()).expect("small")).collect();
        assert_eq!(traced, expected, "reported samples are a prefix of the iterations");

        let dropped = report.iterations as usize - report.samples.len();
        assert!(dropped <= 1, "only the in-flight iteration may be dropped");
        if report.converged_at == Some(report.iterations) {
            assert_eq!(dropped, 0, "the closing iteration is co-located");
        }
    }
    assert!(
        outcome
            .reports
            .iter()
            .any(|r| r.converged_at == Some(r.iterations)),
        "one runner closed the session with its converging iteration"
    );
}

#[tokio::test]
async fn single_workload_reports_every_iteration() {
    let launcher = ScriptedLauncher::constant(Duration::from_millis(250));
    let orchestrator = SessionOrchestrator::new(launcher.clone());

    let outcome = orchestrator
        .run_session(&solo(3, 0.0001))
        .await
        .expect("session succeeds");

    assert_eq!(outcome.completed, 1);
    let report = &outcome.reports[0];
    assert_eq!(report.converged_at, Some(3));
    assert_eq!(report.iterations, 3);
    assert_eq!(report.samples.len(), 3, "no solo-tail exclusion for one workload");
    assert_eq!(launcher.iterations_of(0), 3);
}

#[tokio::test]
async fn single_workload_with_min_one_needs_two_samples() {
    let launcher = ScriptedLauncher::constant(ONE_SECOND);
    let outcome = SessionOrchestrator::new(launcher)
        .run_session(&solo(1, 0.0001))
        .await
        .expect("session succeeds");
    assert_eq!(outcome.reports[0].iterations, 2);
    assert_eq!(outcome.reports[0].samples.len(), 2);
}

#[tokio::test]
async fn failure_of_workload_a_fails_the_session() {
    let launcher = ScriptedLauncher::new(|workload, iteration| {
        if workload == 0 && iteration == 3 {
            Err("exited with code 1".into())
        } else {
            Ok(ONE_SECOND)
        }
    });
    let orchestrator = SessionOrchestrator::new(launcher.clone());

    let err = orchestrator
        .run_session(&pair(50, 0.0001, (0, 0)))
        .await
        .expect_err("session fails");

    match err {
        AppError::Execution {
            workload,
            ref command,
            ref reason,
        } => {
            assert_eq!(workload, 0);
            assert_eq!(command, "./a");
            assert!(reason.contains("code 1"));
        }
        other => panic!("expected execution error, got {other:?}"),
    }
    assert_eq!(launcher.iterations_of(0), 3, "no retry after the failure");
    assert!(
        launcher.iterations_of(1) <= 4,
        "partner stops within one iteration, ran {}",
        launcher.iterations_of(1)
    );

    let calls = launcher.calls();
    let failed_at = calls
        .iter()
        .position(|call| *call == (0, 3))
        .expect("failing iteration recorded");
    let partner_after = calls[failed_at + 1..].iter().filter(|(w, _)| *w == 1).count();
    assert!(partner_after <= 1, "partner ran {partner_after} iterations after the failure");
}

#[tokio::test]
async fn panicking_runner_fails_the_session() {
    let launcher = ScriptedLauncher::new(|workload, iteration| {
        assert!(workload != 0 || iteration != 2, "workload 0 crashed");
        Ok(ONE_SECOND)
    });
    let orchestrator = SessionOrchestrator::new(launcher.clone());

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run_session(&pair(3, 0.0001, (0, 0))),
    )
    .await
    .expect("session returns after a runner panic")
    .expect_err("session fails");

    match err {
        AppError::Execution {
            workload,
            ref reason,
            ..
        } => {
            assert_eq!(workload, 0);
            assert!(reason.contains("runner task failed"), "reason: {reason}");
        }
        other => panic!("expected execution error, got {other:?}"),
    }
    assert!(launcher.iterations_of(1) <= 4, "partner stopped after the panic");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_failures_surface_a_single_error() {
    let launcher = ScriptedLauncher::new(|workload, _| Err(format!("workload {workload} broke")));
    let err = SessionOrchestrator::new(launcher)
        .run_session(&pair(5, 0.0001, (0, 0)))
        .await
        .expect_err("session fails");
    assert!(err.workload().is_some());
}

#[tokio::test]
async fn zero_cache_masks_skip_the_allocator() {
    let allocator = Arc::new(SpyAllocator::default());
    let orchestrator = SessionOrchestrator::new(ScriptedLauncher::constant(ONE_SECOND))
        .with_cache_allocator(allocator.clone());

    orchestrator
        .run_session(&pair(2, 0.0001, (0, 0)))
        .await
        .expect("session succeeds");

    assert_eq!(allocator.call_count(), 0);
}

#[tokio::test]
async fn one_zero_mask_skips_the_allocator() {
    let allocator = Arc::new(SpyAllocator::default());
    let orchestrator = SessionOrchestrator::new(ScriptedLauncher::constant(ONE_SECOND))
        .with_cache_allocator(allocator.clone());

    orchestrator
        .run_session(&pair(2, 0.0001, (0x0f, 0)))
        .await
        .expect("session succeeds");

    assert_eq!(allocator.call_count(), 0);
}

#[tokio::test]
async fn non_zero_masks_apply_before_running() {
    let allocator = Arc::new(SpyAllocator::default());
    let orchestrator = SessionOrchestrator::new(ScriptedLauncher::constant(ONE_SECOND))
        .with_cache_allocator(allocator.clone());

    orchestrator
        .run_session(&pair(2, 0.0001, (0x0f, 0xf0)))
        .await
        .expect("session succeeds");

    assert_eq!(allocator.call_count(), 1);
}

#[tokio::test]
async fn allocator_failure_aborts_before_any_workload_starts() {
    let launcher = ScriptedLauncher::constant(ONE_SECOND);
    let allocator = Arc::new(SpyAllocator::failing());
    let orchestrator =
        SessionOrchestrator::new(launcher.clone()).with_cache_allocator(allocator.clone());

    let err = orchestrator
        .run_session(&pair(2, 0.0001, (0x0f, 0xf0)))
        .await
        .expect_err("allocation fails");

    assert!(matches!(err, AppError::CacheAllocation(_)));
    assert!(launcher.calls().is_empty(), "no workload may start");
}

#[tokio::test]
async fn missing_allocator_is_a_cache_allocation_error() {
    let launcher = ScriptedLauncher::constant(ONE_SECOND);
    let err = SessionOrchestrator::new(launcher.clone())
        .run_session(&pair(2, 0.0001, (0x0f, 0xf0)))
        .await
        .expect_err("no allocator");
    assert!(matches!(err, AppError::CacheAllocation(_)));
    assert!(launcher.calls().is_empty());
}
