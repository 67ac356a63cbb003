use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use jam_collab::{JamSummary, Settings};
use jam_core::{Collection, Device, PlaybackState, QueueEntry, SearchResults};

use crate::{
    auth::Identity,
    errors::ServerResult,
    schemas::{
        CollectionResult, CollectionSchema, ExportSchema, PlaybackSchema, SearchQuery,
        SettingsSchema, ValidatedJson, VoteResult, VoteSchema,
    },
    ws, ServerContext,
};

async fn create_jam(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
) -> ServerResult<(StatusCode, Json<JamSummary>)> {
    let session = context.collab.sessions.create(&identity).await?;

    Ok((StatusCode::CREATED, Json(session.summary().await)))
}

async fn list_jams(_identity: Identity, State(context): State<ServerContext>) -> Json<Vec<JamSummary>> {
    Json(context.collab.sessions.list().await)
}

async fn jam(
    _identity: Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
) -> ServerResult<Json<JamSummary>> {
    let session = context.session(&label)?;

    Ok(Json(session.summary().await))
}

async fn join(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
) -> ServerResult<Json<JamSummary>> {
    let session = context.collab.sessions.join(&label, &identity)?;

    Ok(Json(session.summary().await))
}

async fn leave(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
) -> ServerResult<StatusCode> {
    context.collab.sessions.leave(&label, &identity).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn settings(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
) -> ServerResult<Json<Settings>> {
    let session = context.session(&label)?;
    session.member(&identity)?;

    Ok(Json(session.settings().await))
}

async fn update_settings(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
    ValidatedJson(body): ValidatedJson<SettingsSchema>,
) -> ServerResult<Json<Settings>> {
    let session = context.session(&label)?;
    let settings = session.set_settings(&identity, body.into()).await?;

    Ok(Json(settings))
}

async fn playback(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
) -> ServerResult<Json<PlaybackState>> {
    let session = context.session(&label)?;
    session.member(&identity)?;

    Ok(Json(session.playback().await))
}

async fn update_playback(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
    ValidatedJson(body): ValidatedJson<PlaybackSchema>,
) -> ServerResult<Json<PlaybackState>> {
    let session = context.session(&label)?;
    let state = session.set_playback(&identity, body.into()).await?;

    Ok(Json(state))
}

async fn devices(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
) -> ServerResult<Json<Vec<Device>>> {
    let session = context.session(&label)?;

    Ok(Json(session.devices(&identity).await?))
}

async fn playlists(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
) -> ServerResult<Json<Vec<Collection>>> {
    let session = context.session(&label)?;

    Ok(Json(session.host_playlists(&identity).await?))
}

async fn queue(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
) -> ServerResult<Json<Vec<QueueEntry>>> {
    let session = context.session(&label)?;

    Ok(Json(session.queue_for(&identity).await?))
}

async fn history(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
) -> ServerResult<Json<Vec<QueueEntry>>> {
    let session = context.session(&label)?;

    Ok(Json(session.history_for(&identity).await?))
}

async fn vote(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
    ValidatedJson(body): ValidatedJson<VoteSchema>,
) -> ServerResult<Json<VoteResult>> {
    let session = context.session(&label)?;
    let voted = session.vote(&identity, &body.song_id).await?;

    Ok(Json(VoteResult { voted }))
}

async fn delete_song(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path((label, song_id)): Path<(String, String)>,
) -> ServerResult<StatusCode> {
    let session = context.session(&label)?;
    session.delete_song(&identity, &song_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn add_collection(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
    ValidatedJson(body): ValidatedJson<CollectionSchema>,
) -> ServerResult<Json<CollectionResult>> {
    let session = context.session(&label)?;
    let added = session.add_collection(&identity, body.kind, &body.id).await?;

    Ok(Json(CollectionResult { added }))
}

async fn export(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
    ValidatedJson(body): ValidatedJson<ExportSchema>,
) -> ServerResult<Json<Collection>> {
    let session = context.session(&label)?;
    let playlist = session.export_history(&identity, &body.name).await?;

    Ok(Json(playlist))
}

async fn search(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
    Query(query): Query<SearchQuery>,
) -> ServerResult<Json<SearchResults>> {
    let session = context.session(&label)?;
    let results = session.search(&identity, &query.query, query.kind).await?;

    Ok(Json(results))
}

pub fn router() -> Router<ServerContext> {
    Router::new()
        .route("/", get(list_jams).post(create_jam))
        .route("/:label", get(jam))
        .route("/:label/members", post(join).delete(leave))
        .route("/:label/settings", get(settings).put(update_settings))
        .route("/:label/playback", get(playback).put(update_playback))
        .route("/:label/devices", get(devices))
        .route("/:label/playlists", get(playlists))
        .route("/:label/queue", get(queue).post(vote))
        .route("/:label/queue/:song_id", delete(delete_song))
        .route("/:label/history", get(history))
        .route("/:label/collections", post(add_collection))
        .route("/:label/export", post(export))
        .route("/:label/search", get(search))
        .route("/:label/ws", get(ws::connect))
}
