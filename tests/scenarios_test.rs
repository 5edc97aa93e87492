//! End-to-end buying-process scenarios

mod common;

use common::*;
use salesbrain::graph::{ActorId, CriterionId, DealOutcome, SignOff, Status};
use salesbrain::{
    Blocker, CriterionAttributes, DependencyGraph, EngineError, ForecastDimension, HistoryEvent,
    Transition,
};

/// Signatory and evaluator criteria plus sign-off complete a step
#[test]
fn test_scenario_a_step_completes() -> anyhow::Result<()> {
    let mut deal = new_deal("scenario-a");
    let step = usable_step(&mut deal, "security", ForecastDimension::SecurityCompliance);
    let a = signatory(&mut deal, &step, "a");
    let b = evaluator(&mut deal, &step, "b");
    let c1 = mandatory(&mut deal, &a, "c1");
    let c2 = mandatory(&mut deal, &b, "c2");

    deal.set_status(step.clone(), Status::InProgress)?;
    deal.set_status(c1.clone(), Status::Completed)?;
    deal.set_status(c2.clone(), Status::Completed)?;
    evidence(&mut deal, &step);

    // Sign-off still pending
    let err = deal.set_status(step.clone(), Status::Completed).unwrap_err();
    assert!(matches!(err, EngineError::StepNotReady { .. }));
    assert_eq!(deal.step_status(&step)?.effective, Status::InProgress);
    assert!(deal.actor_status(&b)?.complete);
    assert!(!deal.actor_status(&a)?.complete);

    deal.record_sign_off(&a, SignOff::Granted)?;
    assert_eq!(deal.step_status(&step)?.effective, Status::Completed);
    assert!(deal.step_status(&step)?.is_ready());
    assert_eq!(deal.outcome(), DealOutcome::ClosedWon);

    // The caller may now record the completion explicitly
    deal.set_status(step.clone(), Status::Completed)?;
    assert_eq!(deal.step_status(&step)?.marked, Status::Completed);
    Ok(())
}

/// Criterion work and sign-off alone carry an unstarted step to completion
#[test]
fn test_scenario_a_without_explicit_start() -> anyhow::Result<()> {
    let mut deal = new_deal("scenario-a-implicit");
    let step = usable_step(&mut deal, "security", ForecastDimension::SecurityCompliance);
    let a = signatory(&mut deal, &step, "a");
    let b = evaluator(&mut deal, &step, "b");
    let c1 = mandatory(&mut deal, &a, "c1");
    let c2 = mandatory(&mut deal, &b, "c2");
    evidence(&mut deal, &step);
    assert_eq!(deal.step_status(&step)?.effective, Status::NotStarted);

    deal.set_status(c1, Status::Completed)?;
    assert_eq!(deal.step_status(&step)?.effective, Status::InProgress);
    deal.set_status(c2, Status::Completed)?;
    deal.record_sign_off(&a, SignOff::Granted)?;

    let rollup = deal.step_status(&step)?;
    assert_eq!(rollup.marked, Status::NotStarted);
    assert_eq!(rollup.effective, Status::Completed);
    assert_eq!(deal.outcome(), DealOutcome::ClosedWon);
    Ok(())
}

#[test]
fn test_step_never_completes_with_open_mandatory_criterion() -> anyhow::Result<()> {
    let mut deal = new_deal("open-mandatory");
    let step = usable_step(&mut deal, "legal", ForecastDimension::Contract);
    let a = signatory(&mut deal, &step, "gc");
    let c1 = mandatory(&mut deal, &a, "redlines");
    let nice = optional(&mut deal, &a, "nice-to-have");
    evidence(&mut deal, &step);

    deal.set_status(step.clone(), Status::InProgress)?;
    deal.record_sign_off(&a, SignOff::Granted)?;
    assert_eq!(deal.step_status(&step)?.effective, Status::InProgress);
    let blockers = deal.step_status(&step)?.blockers;
    assert_eq!(
        blockers,
        vec![Blocker::Actor {
            actor: a.clone(),
            role: salesbrain::graph::Role::Signatory,
            open_criteria: vec![c1.clone(), nice.clone()],
            sign_off: Some(SignOff::Granted),
            has_basis: true,
        }]
    );

    // A signatory answers for its non-mandatory criteria as well
    deal.set_status(c1.clone(), Status::Completed)?;
    let rollup = deal.step_status(&step)?;
    assert_eq!(rollup.effective, Status::InProgress);
    assert!(matches!(
        &rollup.blockers[..],
        [Blocker::Actor { open_criteria, .. }] if *open_criteria == vec![nice.clone()]
    ));
    assert_eq!(deal.outcome(), DealOutcome::Open);

    deal.set_status(nice, Status::Bypassed)?;
    assert_eq!(deal.step_status(&step)?.effective, Status::Completed);

    deal.set_status(CriterionId::new("redlines"), Status::InProgress)?;
    assert_eq!(deal.step_status(&step)?.effective, Status::InProgress);
    Ok(())
}

/// A criterion depending on an actor waits for every criterion the actor owns
#[test]
fn test_scenario_b_actor_dependency() -> anyhow::Result<()> {
    let mut deal = new_deal("scenario-b");
    let step = usable_step(&mut deal, "business-case", ForecastDimension::BusinessCase);
    let d = signatory(&mut deal, &step, "d");
    let e = evaluator(&mut deal, &step, "e");
    let c3 = mandatory(&mut deal, &d, "c3");
    let c4 = mandatory(&mut deal, &e, "c4");
    let c5 = optional(&mut deal, &e, "c5");

    deal.add_criterion_dependency(&c3, e.clone())?;
    deal.set_status(c3.clone(), Status::Completed)?;

    let rollup = deal.criterion_status(&c3)?;
    assert_eq!(rollup.marked, Status::Completed);
    assert_eq!(rollup.effective, Status::InProgress);
    assert_eq!(rollup.open_dependencies, vec![c4.clone(), c5.clone()]);

    deal.set_status(c4.clone(), Status::Completed)?;
    assert_eq!(deal.criterion_status(&c3)?.open_dependencies, vec![c5.clone()]);

    deal.set_status(c5.clone(), Status::Bypassed)?;
    assert_eq!(deal.criterion_status(&c3)?.effective, Status::Completed);

    // Bypass is closure but stays distinguishable from completion
    assert_eq!(deal.criterion_status(&c5)?.effective, Status::Bypassed);
    let c5_node = c5.node();
    let marks: Vec<&HistoryEvent> = deal
        .history()
        .for_entity(&c5_node)
        .map(|entry| &entry.event)
        .collect();
    assert!(marks.contains(&&HistoryEvent::Marked {
        entity: c5.node(),
        status: Status::Bypassed,
    }));
    assert!(!marks.iter().any(|event| matches!(
        event,
        HistoryEvent::Marked { status: Status::Completed, .. }
    )));
    Ok(())
}

/// Inheritance is live: criteria added to the actor later are depended on too
#[test]
fn test_inheritance_picks_up_new_criteria() -> anyhow::Result<()> {
    let mut deal = new_deal("live-inheritance");
    let step = usable_step(&mut deal, "tech", ForecastDimension::Technical);
    let d = signatory(&mut deal, &step, "d");
    let e = evaluator(&mut deal, &step, "e");
    let c3 = mandatory(&mut deal, &d, "c3");
    let c4 = mandatory(&mut deal, &e, "c4");

    deal.add_criterion_dependency(&c3, e.clone())?;
    deal.set_status(c4, Status::Completed)?;
    deal.set_status(c3.clone(), Status::Completed)?;
    assert_eq!(deal.criterion_status(&c3)?.effective, Status::Completed);

    let c9 = mandatory(&mut deal, &e, "c9");
    let rollup = deal.criterion_status(&c3)?;
    assert_eq!(rollup.effective, Status::InProgress);
    assert_eq!(rollup.open_dependencies, vec![c9.clone()]);

    let reopened = deal.history().iter().any(|entry| {
        entry.event
            == HistoryEvent::Derived(Transition::Status {
                entity: c3.node(),
                from: Some(Status::Completed),
                to: Status::InProgress,
            })
    });
    assert!(reopened);

    deal.remove_criterion(&c9)?;
    assert_eq!(deal.criterion_status(&c3)?.effective, Status::Completed);
    Ok(())
}

/// A dependent step may start early but only completes after its prerequisite
#[test]
fn test_scenario_c_step_prerequisite() -> anyhow::Result<()> {
    let mut deal = new_deal("scenario-c");
    let (s1, _, _) = simple_step(&mut deal, "s1", ForecastDimension::Technical);
    let (s2, a2, c2) = simple_step(&mut deal, "s2", ForecastDimension::Commercial);
    deal.add_step_dependency(&s2, &s1)?;

    deal.set_status(s1.clone(), Status::InProgress)?;
    deal.set_status(s2.clone(), Status::InProgress)?;

    deal.set_status(c2, Status::Completed)?;
    deal.record_sign_off(&a2, SignOff::Granted)?;
    evidence(&mut deal, &s2);

    let rollup = deal.step_status(&s2)?;
    assert_eq!(rollup.effective, Status::InProgress);
    assert_eq!(
        rollup.blockers,
        vec![Blocker::Prerequisite {
            step: s1.clone(),
            status: Status::InProgress,
        }]
    );
    assert!(matches!(
        deal.set_status(s2.clone(), Status::Completed),
        Err(EngineError::StepNotReady { .. })
    ));

    // Closing the prerequisite cascades into the dependent step
    deal.set_status(s1.clone(), Status::Bypassed)?;
    assert_eq!(deal.step_status(&s1)?.effective, Status::Bypassed);
    assert_eq!(deal.step_status(&s2)?.effective, Status::Completed);
    assert_eq!(deal.outcome(), DealOutcome::ClosedWon);
    Ok(())
}

/// Closing a cycle through actor inheritance is rejected with the full path
#[test]
fn test_scenario_d_inherited_cycle() -> anyhow::Result<()> {
    let mut deal = new_deal("scenario-d");
    let step = usable_step(&mut deal, "impl", ForecastDimension::ImplementationReadiness);
    let x = evaluator(&mut deal, &step, "x");
    let f = evaluator(&mut deal, &step, "f");
    let c6 = mandatory(&mut deal, &x, "c6");
    let c7 = mandatory(&mut deal, &f, "c7");

    // F's criterion depends on everything X owns, C6 included
    deal.add_criterion_dependency(&c7, x.clone())?;

    let edges = deal.store().edge_count();
    let history = deal.history().len();
    let err = deal.add_criterion_dependency(&c6, f.clone()).unwrap_err();
    match &err {
        EngineError::CycleDetected(cycle) => {
            assert_eq!(cycle.graph, DependencyGraph::Criterion);
            assert_eq!(
                cycle.path,
                vec![c6.node(), f.node(), c7.node(), x.node(), c6.node()]
            );
        }
        other => panic!("expected a cycle, got {}", other),
    }
    assert_eq!(
        err.to_string(),
        "Dependency cycle in criterion graph: criterion:c6 -> actor:f -> criterion:c7 -> actor:x -> criterion:c6"
    );
    assert_eq!(deal.store().edge_count(), edges);
    assert_eq!(deal.history().len(), history);

    // The direct form of the same cycle is rejected as well
    assert!(matches!(
        deal.add_criterion_dependency(&c6, c7.clone()),
        Err(EngineError::CycleDetected(_))
    ));
    Ok(())
}

#[test]
fn test_influencer_never_blocks() -> anyhow::Result<()> {
    let mut deal = new_deal("influencer");
    let (step, a, c) = simple_step(&mut deal, "pilot", ForecastDimension::AdoptionReadiness);
    deal.assign_actor(
        &step,
        "champion",
        salesbrain::graph::Person::new("Champion"),
        salesbrain::graph::Role::Influencer,
    )?;
    deal.create_criterion(
        &ActorId::new("champion"),
        "wishlist",
        CriterionAttributes::optional("dark mode"),
    )?;
    // Influencers cannot own mandatory criteria
    assert!(deal
        .create_criterion(
            &ActorId::new("champion"),
            "demand",
            CriterionAttributes::mandatory("must have SSO"),
        )
        .is_err());

    deal.set_status(step.clone(), Status::InProgress)?;
    deal.set_status(c, Status::Completed)?;
    deal.record_sign_off(&a, SignOff::Granted)?;
    evidence(&mut deal, &step);
    assert_eq!(deal.step_status(&step)?.effective, Status::Completed);
    Ok(())
}
