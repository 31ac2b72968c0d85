use super::{EntityStore, Mutation, ParentKind, StoreError, WriteBatch};
use crate::models::{Board, Card, List, User};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, ClientSession, Collection, Database, IndexModel,
};

#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            StoreError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), StoreError> {
        tracing::info!("Creating MongoDB indexes for board-service");

        let unique = |name: &str| {
            IndexOptions::builder()
                .name(name.to_string())
                .unique(true)
                .build()
        };
        let named = |name: &str| IndexOptions::builder().name(name.to_string()).build();

        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique("email_unique"))
                    .build(),
                None,
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique("username_unique"))
                    .build(),
                None,
            )
            .await?;
        tracing::info!("Created unique indexes on users.email and users.username");

        self.boards()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "members": 1 })
                    .options(named("members_lookup"))
                    .build(),
                None,
            )
            .await?;
        self.lists()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "board": 1, "position": 1 })
                    .options(named("board_order"))
                    .build(),
                None,
            )
            .await?;
        self.cards()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "list": 1, "position": 1 })
                    .options(named("list_order"))
                    .build(),
                None,
            )
            .await?;
        tracing::info!("Created ordering indexes on lists and cards");

        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    fn boards(&self) -> Collection<Board> {
        self.db.collection("boards")
    }

    fn lists(&self) -> Collection<List> {
        self.db.collection("lists")
    }

    fn cards(&self) -> Collection<Card> {
        self.db.collection("cards")
    }

    async fn find_sorted<T>(
        collection: Collection<T>,
        filter: Document,
        sort: Document,
    ) -> Result<Vec<T>, StoreError>
    where
        T: serde::de::DeserializeOwned + Unpin + Send + Sync,
    {
        let options = FindOptions::builder().sort(sort).build();
        let cursor = collection.find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn apply_in_session(
        &self,
        batch: WriteBatch,
        session: &mut ClientSession,
    ) -> Result<(), StoreError> {
        if let Some(guard) = &batch.guard {
            let filter = doc! { "_id": &guard.id, "version": guard.expected_version };
            let bump = doc! { "$inc": { "version": 1_i64 } };
            let result = match guard.kind {
                ParentKind::Board => {
                    self.boards()
                        .update_one_with_session(filter, bump, None, session)
                        .await?
                }
                ParentKind::List => {
                    self.lists()
                        .update_one_with_session(filter, bump, None, session)
                        .await?
                }
            };
            if result.matched_count == 0 {
                return Err(StoreError::Conflict);
            }
        }

        for mutation in batch.mutations {
            self.apply_mutation(mutation, session).await?;
        }

        Ok(())
    }

    async fn apply_mutation(
        &self,
        mutation: Mutation,
        session: &mut ClientSession,
    ) -> Result<(), StoreError> {
        let now = chrono::Utc::now();

        match mutation {
            Mutation::SetBoardTitle { id, title } => {
                let result = self
                    .boards()
                    .update_one_with_session(
                        doc! { "_id": &id },
                        doc! { "$set": { "title": title, "updated_at": now } },
                        None,
                        session,
                    )
                    .await?;
                require_match(result.matched_count, "Board", &id)
            }
            Mutation::SetBoardLists { id, lists } => {
                let result = self
                    .boards()
                    .update_one_with_session(
                        doc! { "_id": &id },
                        doc! { "$set": { "lists": lists, "updated_at": now } },
                        None,
                        session,
                    )
                    .await?;
                require_match(result.matched_count, "Board", &id)
            }
            Mutation::DeleteBoard { id } => {
                let result = self
                    .boards()
                    .delete_one_with_session(doc! { "_id": &id }, None, session)
                    .await?;
                require_match(result.deleted_count, "Board", &id)
            }
            Mutation::InsertList(list) => {
                self.lists()
                    .insert_one_with_session(&list, None, session)
                    .await?;
                Ok(())
            }
            Mutation::SetListTitle { id, title } => {
                let result = self
                    .lists()
                    .update_one_with_session(
                        doc! { "_id": &id },
                        doc! { "$set": { "title": title, "updated_at": now } },
                        None,
                        session,
                    )
                    .await?;
                require_match(result.matched_count, "List", &id)
            }
            Mutation::SetListPosition { id, position } => {
                let result = self
                    .lists()
                    .update_one_with_session(
                        doc! { "_id": &id },
                        doc! { "$set": { "position": position, "updated_at": now } },
                        None,
                        session,
                    )
                    .await?;
                require_match(result.matched_count, "List", &id)
            }
            Mutation::SetListCards { id, cards } => {
                let result = self
                    .lists()
                    .update_one_with_session(
                        doc! { "_id": &id },
                        doc! { "$set": { "cards": cards, "updated_at": now } },
                        None,
                        session,
                    )
                    .await?;
                require_match(result.matched_count, "List", &id)
            }
            Mutation::DeleteList { id } => {
                let result = self
                    .lists()
                    .delete_one_with_session(doc! { "_id": &id }, None, session)
                    .await?;
                require_match(result.deleted_count, "List", &id)
            }
            Mutation::DeleteListsInBoard { board_id } => {
                self.lists()
                    .delete_many_with_session(doc! { "board": &board_id }, None, session)
                    .await?;
                Ok(())
            }
            Mutation::InsertCard(card) => {
                self.cards()
                    .insert_one_with_session(&card, None, session)
                    .await?;
                Ok(())
            }
            Mutation::SetCardFields {
                id,
                title,
                description,
            } => {
                let result = self
                    .cards()
                    .update_one_with_session(
                        doc! { "_id": &id },
                        doc! {
                            "$set": {
                                "title": title,
                                "description": description,
                                "updated_at": now
                            }
                        },
                        None,
                        session,
                    )
                    .await?;
                require_match(result.matched_count, "Card", &id)
            }
            Mutation::SetCardPosition { id, position } => {
                let result = self
                    .cards()
                    .update_one_with_session(
                        doc! { "_id": &id },
                        doc! { "$set": { "position": position, "updated_at": now } },
                        None,
                        session,
                    )
                    .await?;
                require_match(result.matched_count, "Card", &id)
            }
            Mutation::DeleteCard { id } => {
                let result = self
                    .cards()
                    .delete_one_with_session(doc! { "_id": &id }, None, session)
                    .await?;
                require_match(result.deleted_count, "Card", &id)
            }
            Mutation::DeleteCardsInLists { list_ids } => {
                self.cards()
                    .delete_many_with_session(doc! { "list": { "$in": list_ids } }, None, session)
                    .await?;
                Ok(())
            }
        }
    }
}

fn require_match(count: u64, kind: &str, id: &str) -> Result<(), StoreError> {
    if count == 0 {
        Err(StoreError::NotFound(format!("{} {}", kind, id)))
    } else {
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MongoStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                StoreError::from(e)
            })?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.users().insert_one(user, None).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_user_by_login(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one(
                doc! { "$or": [ { "username": username }, { "email": email } ] },
                None,
            )
            .await?)
    }

    async fn insert_board(&self, board: &Board) -> Result<(), StoreError> {
        self.boards().insert_one(board, None).await?;
        Ok(())
    }

    async fn find_board(&self, id: &str) -> Result<Option<Board>, StoreError> {
        Ok(self.boards().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_boards_for_user(&self, user_id: &str) -> Result<Vec<Board>, StoreError> {
        Self::find_sorted(
            self.boards(),
            doc! { "$or": [ { "owner": user_id }, { "members": user_id } ] },
            doc! { "created_at": 1 },
        )
        .await
    }

    async fn find_list(&self, id: &str) -> Result<Option<List>, StoreError> {
        Ok(self.lists().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_lists_in_board(&self, board_id: &str) -> Result<Vec<List>, StoreError> {
        Self::find_sorted(
            self.lists(),
            doc! { "board": board_id },
            doc! { "position": 1 },
        )
        .await
    }

    async fn find_card(&self, id: &str) -> Result<Option<Card>, StoreError> {
        Ok(self.cards().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_cards_in_list(&self, list_id: &str) -> Result<Vec<Card>, StoreError> {
        Self::find_sorted(
            self.cards(),
            doc! { "list": list_id },
            doc! { "position": 1 },
        )
        .await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        match self.apply_in_session(batch, &mut session).await {
            Ok(()) => {
                session.commit_transaction().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    tracing::warn!(error = %abort_err, "Failed to abort MongoDB transaction");
                }
                Err(err)
            }
        }
    }
}
