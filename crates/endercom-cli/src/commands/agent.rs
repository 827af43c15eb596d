use endercom_config::EndercomConfig;
use endercom_core::{EndercomError, Result};
use endercom_runtime::{Agent, RunSummary};
use endercom_server::ServerAgent;
use tracing::info;

use super::shutdown_on_ctrl_c;
use crate::handlers::demo_handler;

pub(super) async fn cmd_agent(
    config: &EndercomConfig,
    server: bool,
    no_poll: bool,
    port: Option<u16>,
) -> Result<()> {
    let serve = server || config.server.enabled;
    let poll = !no_poll && config.server.poll;
    if !serve && !poll {
        return Err(EndercomError::Config(
            "polling is off (--no-poll or server.poll = false) and the server is not enabled".into(),
        ));
    }

    let agent = Agent::new(config.agent_options()?)?.with_handler(demo_handler());
    let run = config.run_options();
    let shutdown = shutdown_on_ctrl_c();

    println!(
        "🛰  {} on frequency {}",
        agent.options().agent_name,
        agent.options().frequency_id
    );

    if serve {
        let mut options = config.server_options();
        if let Some(port) = port {
            options.port = port;
        }
        println!("   Serving on http://{}", options.addr());
        let mut server_agent = ServerAgent::new(agent, options)?;
        if !poll {
            println!("   Polling disabled");
            server_agent = server_agent.without_polling();
        }
        if let Some(summary) = server_agent.run(run, shutdown).await? {
            print_summary(&summary);
        }
    } else {
        if port.is_some() {
            info!("--port has no effect without --server");
        }
        let summary = agent.run_async(run, shutdown).await?;
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("✅ Stopped at cursor {}", summary.cursor);
    println!(
        "   {} polls, {} received, {} handled, {} failed, {} skipped, {} abandoned",
        summary.polls,
        summary.received,
        summary.handled,
        summary.failed,
        summary.skipped,
        summary.abandoned
    );
    println!(
        "   {} published, {} publish failures",
        summary.published, summary.publish_failures
    );
}
