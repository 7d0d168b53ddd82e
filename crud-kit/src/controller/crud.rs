use super::context::{RequestScope, ValidatedJson};
use super::{guarded, CrudPolicy, ResourceLinks};
use crate::auth::Caller;
use crate::claims::Claims;
use crate::entry::IdEntry;
use crate::links::{Items, LinkResult, NoContent};
use crate::provider::Provider;
use crate::service::DomainService;
use crate::transaction::TransactionHandler;
use crate::transformer::Transformer;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, options, post, put},
    Json, Router,
};
use service_core::error::AppError;
use std::sync::Arc;

/// `POST|GET|OPTIONS /api/<Name>` and `GET|PUT|DELETE /api/<Name>/:id`
/// over a [`DomainService`].
pub struct CrudController<P, T, H> {
    service: DomainService<P, T, H>,
    links: Arc<ResourceLinks>,
}

impl<P, T, H> Clone for CrudController<P, T, H> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            links: Arc::clone(&self.links),
        }
    }
}

impl<P, T, H> CrudController<P, T, H>
where
    P: Provider,
    T: Transformer<Entry = P::Entry>,
    H: TransactionHandler<Handle = P::Handle>,
{
    pub fn new(name: &str, service: DomainService<P, T, H>, policy: CrudPolicy) -> Self {
        Self {
            service,
            links: Arc::new(ResourceLinks::new(name, policy)),
        }
    }

    /// Overrides the urn namespace, which defaults to the resource name.
    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        Self {
            service: self.service,
            links: Arc::new(self.links.as_ref().clone().with_namespace(namespace)),
        }
    }

    pub fn router(self) -> Router {
        let base = self.links.base().to_string();
        let item = format!("{}/:id", base);
        let policy = self.links.policy().clone();

        Router::new()
            .route(
                &base,
                guarded(post(create::<P, T, H>), &policy.create)
                    .merge(guarded(get(read_all::<P, T, H>), &policy.read))
                    .merge(options(describe::<P, T, H>)),
            )
            .route(
                &item,
                guarded(get(read_by_id::<P, T, H>), &policy.read)
                    .merge(guarded(put(update::<P, T, H>), &policy.update))
                    .merge(guarded(delete(remove::<P, T, H>), &policy.delete)),
            )
            .with_state(self)
    }

    fn wrap(&self, entry: P::Entry, claims: &Claims) -> LinkResult<T::Result> {
        let links = self.links.entry_links(entry.id(), claims);
        LinkResult::new(self.service.transformer().to_result(entry), links)
    }
}

async fn create<P, T, H>(
    State(controller): State<CrudController<P, T, H>>,
    Caller(claims): Caller,
    scope: RequestScope,
    ValidatedJson(body): ValidatedJson<T::Create>,
) -> Result<(StatusCode, Json<LinkResult<T::Result>>), AppError>
where
    P: Provider,
    T: Transformer<Entry = P::Entry>,
    H: TransactionHandler<Handle = P::Handle>,
{
    let entry = controller.service.create(body, scope.token()).await?;
    Ok((StatusCode::CREATED, Json(controller.wrap(entry, &claims))))
}

async fn read_all<P, T, H>(
    State(controller): State<CrudController<P, T, H>>,
    Caller(claims): Caller,
    scope: RequestScope,
) -> Result<Json<LinkResult<Items<LinkResult<T::Result>>>>, AppError>
where
    P: Provider,
    T: Transformer<Entry = P::Entry>,
    H: TransactionHandler<Handle = P::Handle>,
{
    let entries = controller.service.read(scope.token()).await?;
    let items = entries
        .into_iter()
        .map(|entry| controller.wrap(entry, &claims))
        .collect();

    Ok(Json(LinkResult::new(
        Items { items },
        controller.links.collection_links(&claims),
    )))
}

async fn read_by_id<P, T, H>(
    State(controller): State<CrudController<P, T, H>>,
    Caller(claims): Caller,
    scope: RequestScope,
    Path(id): Path<String>,
) -> Result<Json<LinkResult<T::Result>>, AppError>
where
    P: Provider,
    T: Transformer<Entry = P::Entry>,
    H: TransactionHandler<Handle = P::Handle>,
{
    let entry = controller.service.read_by_id(id, scope.token()).await?;
    Ok(Json(controller.wrap(entry, &claims)))
}

async fn update<P, T, H>(
    State(controller): State<CrudController<P, T, H>>,
    Caller(claims): Caller,
    scope: RequestScope,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<T::Update>,
) -> Result<Json<LinkResult<T::Result>>, AppError>
where
    P: Provider,
    T: Transformer<Entry = P::Entry>,
    H: TransactionHandler<Handle = P::Handle>,
{
    let entry = controller.service.update(id, body, scope.token()).await?;
    Ok(Json(controller.wrap(entry, &claims)))
}

async fn remove<P, T, H>(
    State(controller): State<CrudController<P, T, H>>,
    scope: RequestScope,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError>
where
    P: Provider,
    T: Transformer<Entry = P::Entry>,
    H: TransactionHandler<Handle = P::Handle>,
{
    controller.service.delete(id, scope.token()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn describe<P, T, H>(
    State(controller): State<CrudController<P, T, H>>,
    Caller(claims): Caller,
) -> Json<LinkResult<NoContent>>
where
    P: Provider,
    T: Transformer<Entry = P::Entry>,
    H: TransactionHandler<Handle = P::Handle>,
{
    Json(LinkResult::new(NoContent {}, controller.links.options_links(&claims)))
}
