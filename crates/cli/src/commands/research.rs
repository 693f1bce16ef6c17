//! `scoutloop research`: find and save leads for a product.

use scoutloop_agent::{ResearchController, ResearchGoal, StopReason};
use scoutloop_core::ActionCatalog;

use super::{cancel_on_ctrl_c, load, print_step};

pub struct ResearchArgs {
    pub product: String,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub target: Option<usize>,
    pub iterations: Option<usize>,
}

pub async fn run(args: ResearchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (config, provider) = load()?;

    let mut goal = ResearchGoal::new(args.product)
        .with_target(args.target.unwrap_or(config.research.target_count))
        .with_budget(args.iterations.unwrap_or(config.research.max_search_iterations));
    if let Some(id) = args.product_id {
        goal = goal.with_product(id, args.product_name);
    } else {
        goal.product_name = args.product_name;
    }

    // Lead actions (search, enrichment, scoring, storage) are supplied by the
    // embedding application; only complete_task is built in.
    let controller = ResearchController::from_config(provider, &config, ActionCatalog::new(), goal);

    println!();
    println!("  Target:      {} leads", controller.goal().target_count);
    println!(
        "  Budget:      {} search rounds ({} model calls)",
        controller.goal().max_search_iterations,
        controller.raw_iteration_cap()
    );
    println!("  Model:       {}", config.model);
    println!();

    let mut run = controller.start(cancel_on_ctrl_c());
    while let Some(step) = run.next_step().await {
        print_step(&step);
    }
    let outcome = run.finish().await;

    println!();
    println!("  Saved {}/{} leads ({:?})", outcome.saved, outcome.target, outcome.stop_reason);

    match outcome.stop_reason {
        StopReason::Failed => Err(outcome.final_text.into()),
        _ => Ok(()),
    }
}
