use endercom_config::EndercomConfig;
use endercom_core::{EndercomError, Result};
use endercom_runtime::Agent;

pub(super) async fn cmd_send(config: &EndercomConfig, content: &str, to: Option<&str>) -> Result<()> {
    if content.trim().is_empty() {
        return Err(EndercomError::Config("message content must not be empty".into()));
    }
    let agent = Agent::new(config.agent_options()?)?;
    if agent.send_message(content, to).await? {
        match to {
            Some(target) => println!("✅ Sent to {target}"),
            None => println!("✅ Broadcast on {}", agent.options().frequency_id),
        }
        Ok(())
    } else {
        Err(EndercomError::Server("frequency rejected the message".into()))
    }
}
