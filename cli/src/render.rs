//! Text renderings of a deal: summary, Mermaid diagram and tables

use comfy_table::{ContentArrangement, Table};
use salesbrain::graph::{
    ActorId, CriterionId, Direction, EdgeKind, GraphStore, NodeId, NodeKind, ProductId, Status,
    StepId, TimelineId,
};
use salesbrain::{BlockingLink, DealEngine, Scorecard, ValidationError};

fn due(store: &GraphStore, node: &NodeId) -> Option<String> {
    store
        .neighbors(node, EdgeKind::HasTimeline, Direction::Outgoing)
        .into_iter()
        .find_map(|id| TimelineId::from_node(id).and_then(|t| store.timeline(&t)))
        .map(|t| t.due.to_string())
}

fn products(store: &GraphStore, node: &NodeId, kind: EdgeKind) -> Vec<String> {
    store
        .neighbors(node, kind, Direction::Outgoing)
        .into_iter()
        .filter_map(ProductId::from_node)
        .map(|p| {
            store
                .product(&p)
                .map(|product| product.name.clone())
                .unwrap_or_else(|| p.to_string())
        })
        .collect()
}

fn steps(store: &GraphStore) -> Vec<StepId> {
    store
        .ids_of_kind(NodeKind::Step)
        .into_iter()
        .filter_map(StepId::from_node)
        .collect()
}

fn step_name(store: &GraphStore, step: &StepId) -> String {
    store
        .step(step)
        .map(|s| s.name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| step.to_string())
}

fn actors_of(store: &GraphStore, step: &StepId) -> Vec<ActorId> {
    store
        .neighbors(&step.node(), EdgeKind::AssignsActor, Direction::Outgoing)
        .into_iter()
        .filter_map(ActorId::from_node)
        .collect()
}

fn criteria_of(store: &GraphStore, actor: &ActorId) -> Vec<CriterionId> {
    store
        .neighbors(&actor.node(), EdgeKind::OwnsCriterion, Direction::Outgoing)
        .into_iter()
        .filter_map(CriterionId::from_node)
        .collect()
}

fn or_na(value: Option<String>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or_else(|| "N/A".to_string())
}

/// Markdown-style summary of the whole buying process
pub fn summary(deal: &DealEngine) -> String {
    let store = deal.store();
    let snapshot = deal.snapshot();
    let mut lines = vec![format!("# Deal: {}", deal.name())];
    if let Some(payload) = store.deal() {
        lines.push(format!("Created: {}", payload.created_at.format("%Y-%m-%d %H:%M")));
    }
    lines.push(format!("Outcome: {}", snapshot.outcome));
    lines.push(String::new());

    let steps = steps(store);
    if steps.is_empty() {
        lines.push("No buying steps recorded yet.".to_string());
        return lines.join("\n");
    }

    for (i, step) in steps.iter().enumerate() {
        let node = step.node();
        let payload = store.step(step);
        let status = snapshot
            .steps
            .get(step)
            .map(|s| s.effective)
            .unwrap_or_default();
        let products = products(store, &node, EdgeKind::StepProduct);
        let dependencies: Vec<String> = store
            .neighbors(&node, EdgeKind::StepDependsOn, Direction::Outgoing)
            .into_iter()
            .filter_map(StepId::from_node)
            .map(|d| step_name(store, &d))
            .collect();

        lines.push(format!("## Buying Step {}: {}", i + 1, step_name(store, step)));
        lines.push(format!("- Status: {}", status));
        lines.push(format!("- Timeline: {}", or_na(due(store, &node))));
        lines.push(format!(
            "- Product: {}",
            or_na(Some(products.join(", ")))
        ));
        lines.push(format!(
            "- Forecast Readiness: {}",
            or_na(payload.and_then(|s| s.dimension).map(|d| d.label().to_string()))
        ));
        lines.push(format!(
            "- Dependencies: {}",
            if dependencies.is_empty() {
                "None".to_string()
            } else {
                dependencies.join(", ")
            }
        ));
        lines.push(format!(
            "- Buyer Owner: {}",
            or_na(payload.and_then(|s| s.buyer_owner.clone()))
        ));
        lines.push(format!(
            "- Seller Owner: {}",
            or_na(payload.and_then(|s| s.seller_owner.clone()))
        ));

        for actor in actors_of(store, step) {
            let Some(payload) = store.actor(&actor) else {
                continue;
            };
            let mut line = format!(
                "  - **{}**: {} | Timeline: {}",
                payload.role.role(),
                payload.person.name,
                or_na(due(store, &actor.node()))
            );
            if let Some(sign_off) = payload.role.sign_off() {
                line.push_str(&format!(" | Sign-off: {}", sign_off));
            }
            lines.push(line);
            for criterion in criteria_of(store, &actor) {
                if let Some(c) = store.criterion(&criterion) {
                    let status = snapshot
                        .criteria
                        .get(&criterion)
                        .map(|r| r.effective)
                        .unwrap_or(c.status);
                    lines.push(format!("    - Criterion: {} [{}]", c.description, status));
                }
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn sanitize(text: &str) -> String {
    if text.is_empty() {
        return "N/A".to_string();
    }
    text.replace('"', "'")
        .replace(['(', '{'], "[")
        .replace([')', '}'], "]")
        .replace(['<', '>', '#'], "")
        .replace('|', "/")
        .replace('&', "and")
}

fn status_class(status: Status) -> &'static str {
    match status {
        Status::Completed => "completed",
        Status::InProgress => "inprogress",
        Status::Bypassed => "bypassed",
        Status::NotStarted => "notstarted",
    }
}

/// Mermaid flowchart of the steps and their prerequisites
pub fn mermaid(deal: &DealEngine) -> String {
    let store = deal.store();
    let snapshot = deal.snapshot();
    let steps = steps(store);
    if steps.is_empty() {
        return String::new();
    }

    let mut lines = vec![
        "graph TD".to_string(),
        "    classDef completed fill:#10b981,stroke:#059669,color:#fff,stroke-width:2px".to_string(),
        "    classDef inprogress fill:#3b82f6,stroke:#2563eb,color:#fff,stroke-width:2px".to_string(),
        "    classDef notstarted fill:#6b7280,stroke:#4b5563,color:#fff,stroke-width:2px".to_string(),
        "    classDef bypassed fill:#f59e0b,stroke:#d97706,color:#fff,stroke-width:2px".to_string(),
        String::new(),
    ];

    for (i, step) in steps.iter().enumerate() {
        let node = step.node();
        let status = snapshot
            .steps
            .get(step)
            .map(|s| s.effective)
            .unwrap_or_default();
        let mut label = vec![
            sanitize(&step_name(store, step)),
            format!("Status: {}", status),
        ];
        if let Some(due) = due(store, &node) {
            label.push(format!("Timeline: {}", due));
        }
        let products = products(store, &node, EdgeKind::StepProduct);
        if !products.is_empty() {
            label.push(format!("Product: {}", sanitize(&products.join(", "))));
        }
        if let Ok(actors) = deal.actors_by_role(step) {
            for (role, group) in [
                ("Signatory", &actors.signatories),
                ("Evaluator", &actors.evaluators),
                ("Influencer", &actors.influencers),
            ] {
                if !group.is_empty() {
                    let names: Vec<String> =
                        group.iter().map(|a| sanitize(&a.person.name)).collect();
                    label.push(format!("{}: {}", role, names.join(", ")));
                }
            }
        }

        lines.push(format!("    step{}[\"{}\"]", i, label.join("\\n")));
        lines.push(format!("    class step{} {}", i, status_class(status)));
        lines.push(String::new());
    }

    let mut has_dependencies = false;
    for (i, step) in steps.iter().enumerate() {
        for prerequisite in store
            .neighbors(&step.node(), EdgeKind::StepDependsOn, Direction::Outgoing)
            .into_iter()
            .filter_map(StepId::from_node)
        {
            if let Some(j) = steps.iter().position(|s| *s == prerequisite) {
                lines.push(format!("    step{} --> step{}", j, i));
                has_dependencies = true;
            }
        }
    }
    // Without explicit prerequisites, show the recorded order
    if !has_dependencies {
        for i in 1..steps.len() {
            lines.push(format!("    step{} --> step{}", i - 1, i));
        }
    }

    lines.join("\n")
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.to_vec());
    table
}

/// One row per actor assignment across the deal
pub fn actors_table(deal: &DealEngine) -> Table {
    let store = deal.store();
    let snapshot = deal.snapshot();
    let mut table = table(&[
        "Step", "Role", "Name", "Title", "Sign-off", "Complete", "Timeline", "Criteria",
    ]);
    for step in steps(store) {
        for actor in actors_of(store, &step) {
            let Some(payload) = store.actor(&actor) else {
                continue;
            };
            let complete = snapshot
                .actors
                .get(&actor)
                .map(|a| if a.complete { "yes" } else { "no" })
                .unwrap_or("-");
            table.add_row(vec![
                step_name(store, &step),
                payload.role.role().to_string(),
                payload.person.name.clone(),
                payload.person.title.clone(),
                payload
                    .role
                    .sign_off()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                complete.to_string(),
                due(store, &actor.node()).unwrap_or_default(),
                criteria_of(store, &actor).len().to_string(),
            ]);
        }
    }
    table
}

pub fn scorecard_table(scorecard: &Scorecard) -> Table {
    let mut table = table(&["Dimension", "Closed", "Covered", "Blocking steps"]);
    for report in &scorecard.dimensions {
        let blocking: Vec<&str> = report.blocking_steps.iter().map(|s| s.as_str()).collect();
        table.add_row(vec![
            report.dimension.label().to_string(),
            if report.closed { "yes" } else { "no" }.to_string(),
            if report.covered { "yes" } else { "no" }.to_string(),
            blocking.join(", "),
        ]);
    }
    table
}

pub fn blockers_table(chain: &[BlockingLink]) -> Table {
    let mut table = table(&["Depth", "Node", "Reason"]);
    for link in chain {
        table.add_row(vec![
            link.depth.to_string(),
            link.node.to_string(),
            link.reason.to_string(),
        ]);
    }
    table
}

pub fn violations_table(violations: &[ValidationError]) -> Table {
    let mut table = table(&["#", "Violation"]);
    for (i, violation) in violations.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), violation.to_string()]);
    }
    table
}
