use futures_util::future::BoxFuture;
use mongodb::bson::doc;
use mongodb::error::UNKNOWN_TRANSACTION_COMMIT_RESULT;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};

use crate::error::ApiError;
use crate::models::{Association, Mission, User, Volunteer};

/// Cap on reruns of a transaction the server aborted as transient.
const MAX_TRANSACTION_RETRIES: u32 = 3;

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Self {
        let client_options = ClientOptions::parse(uri)
            .await
            .expect("Failed to parse MongoDB connection string");
        let client = Client::with_options(client_options).expect("Failed to initialize client");
        let db = client.database(db_name);
        MongoDB { client, db }
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn volunteers(&self) -> Collection<Volunteer> {
        self.db.collection("volunteers")
    }

    pub fn associations(&self) -> Collection<Association> {
        self.db.collection("associations")
    }

    pub fn missions(&self) -> Collection<Mission> {
        self.db.collection("missions")
    }

    /// Unique indexes backing the identifiers and the 1:1 user/profile
    /// relation. Concurrent duplicate writes fail at the store instead of
    /// relying on read-then-write checks alone.
    pub async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        let unique = |keys| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };

        self.users().create_index(unique(doc! { "email": 1 })).await?;
        self.users().create_index(unique(doc! { "user_id": 1 })).await?;
        self.volunteers()
            .create_index(unique(doc! { "volunteer_id": 1 }))
            .await?;
        self.volunteers()
            .create_index(unique(doc! { "user_id": 1 }))
            .await?;
        self.associations()
            .create_index(unique(doc! { "association_id": 1 }))
            .await?;
        self.associations()
            .create_index(unique(doc! { "user_id": 1 }))
            .await?;
        self.missions()
            .create_index(unique(doc! { "mission_id": 1 }))
            .await?;

        Ok(())
    }
}

/// Runs `body` inside a transaction on `session` and commits it.
///
/// A business error from `body` aborts the transaction and surfaces as-is.
/// When the server aborts the transaction with a transient label, for
/// instance because two overlapping transactions touched the same document,
/// the whole body is rerun so its guard filters see the winner's writes and
/// report the right outcome.
pub async fn run_transaction<T, C, F>(
    session: &mut ClientSession,
    ctx: &mut C,
    mut body: F,
) -> Result<T, ApiError>
where
    F: for<'a> FnMut(&'a mut ClientSession, &'a mut C) -> BoxFuture<'a, Result<T, ApiError>>,
{
    let mut retries = 0;
    loop {
        session.start_transaction().await?;
        let outcome = match body(session, ctx).await {
            Ok(value) => commit_with_retry(session).await.map(|_| value),
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retries < MAX_TRANSACTION_RETRIES => {
                retries += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn commit_with_retry(session: &mut ClientSession) -> Result<(), ApiError> {
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(err) if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {}
            Err(err) => return Err(err.into()),
        }
    }
}
