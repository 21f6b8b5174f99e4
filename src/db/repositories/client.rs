use crate::clients::ClientSettings;
use crate::config::DownloadClientConfig;
use crate::entities::{download_clients, prelude::*};
use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::info;

pub struct ClientRepository {
    conn: DatabaseConnection,
}

impl ClientRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn to_active_model(c: &DownloadClientConfig) -> download_clients::ActiveModel {
        download_clients::ActiveModel {
            name: Set(c.name.clone()),
            kind: Set(c.kind),
            host: Set(c.host.clone()),
            port: Set(i32::from(c.port)),
            use_tls: Set(c.use_tls),
            url_base: Set(c.url_base.clone()),
            username: Set(c.username.clone()),
            password: Set(c.password.clone()),
            api_key: Set(c.api_key.clone()),
            default_category: Set(c.default_category.clone()),
            movie_category: Set(c.movie_category.clone()),
            tv_category: Set(c.tv_category.clone()),
            movie_directory: Set(c.movie_directory.clone()),
            tv_directory: Set(c.tv_directory.clone()),
            priority: Set(c.priority),
            enabled: Set(c.enabled),
            remove_completed: Set(c.remove_completed),
            remove_failed: Set(c.remove_failed),
            ..Default::default()
        }
    }

    /// Upserts every configured client by name. Clients that disappeared from
    /// the configuration are disabled rather than deleted so that downloads
    /// still pointing at them keep a valid owner.
    pub async fn sync_from_config(&self, clients: &[DownloadClientConfig]) -> Result<()> {
        for c in clients {
            DownloadClients::insert(Self::to_active_model(c))
                .on_conflict(
                    OnConflict::column(download_clients::Column::Name)
                        .update_columns([
                            download_clients::Column::Kind,
                            download_clients::Column::Host,
                            download_clients::Column::Port,
                            download_clients::Column::UseTls,
                            download_clients::Column::UrlBase,
                            download_clients::Column::Username,
                            download_clients::Column::Password,
                            download_clients::Column::ApiKey,
                            download_clients::Column::DefaultCategory,
                            download_clients::Column::MovieCategory,
                            download_clients::Column::TvCategory,
                            download_clients::Column::MovieDirectory,
                            download_clients::Column::TvDirectory,
                            download_clients::Column::Priority,
                            download_clients::Column::Enabled,
                            download_clients::Column::RemoveCompleted,
                            download_clients::Column::RemoveFailed,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&self.conn)
                .await?;
        }

        let names: Vec<String> = clients.iter().map(|c| c.name.clone()).collect();
        let stale = DownloadClients::update_many()
            .col_expr(
                download_clients::Column::Enabled,
                sea_orm::sea_query::Expr::value(false),
            )
            .filter(download_clients::Column::Name.is_not_in(names))
            .exec(&self.conn)
            .await?;

        if stale.rows_affected > 0 {
            info!(
                count = stale.rows_affected,
                "Disabled download clients no longer present in config"
            );
        }

        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<ClientSettings>> {
        let rows = DownloadClients::find()
            .order_by_asc(download_clients::Column::Priority)
            .order_by_asc(download_clients::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(ClientSettings::from).collect())
    }

    pub async fn list_enabled(&self) -> Result<Vec<ClientSettings>> {
        let rows = DownloadClients::find()
            .filter(download_clients::Column::Enabled.eq(true))
            .order_by_asc(download_clients::Column::Priority)
            .order_by_asc(download_clients::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(ClientSettings::from).collect())
    }
}
