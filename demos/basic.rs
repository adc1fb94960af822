use std::sync::Arc;

use leaddesk_http::{session::keys, CrmClient, MemorySessionStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let token = std::env::var("LEADDESK_TOKEN")?;

    let session = Arc::new(MemorySessionStore::with_token(token));
    if let Ok(user_id) = std::env::var("LEADDESK_USER_ID") {
        session.set(keys::USER_ID, &user_id);
        session.set(keys::ROLE, &std::env::var("LEADDESK_ROLE").unwrap_or_else(|_| "employee".to_owned()));
    }

    let client = CrmClient::from_env().with_session_store(session);

    let _status = client.on_connection_change(|connected| {
        if connected {
            println!("connection restored");
        } else {
            println!("offline, retrying in the background");
        }
    });

    let leads = if client.current_user().is_some() {
        client.my_leads().await?
    } else {
        client.leads().list().await?
    };

    for lead in leads {
        println!("{} {} {:?}", lead.id, lead.name, lead.status);
    }

    Ok(())
}
