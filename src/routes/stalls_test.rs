use super::*;
use crate::state::test_helpers;

#[test]
fn stall_error_to_status_maps_variants() {
    assert_eq!(stall_error_to_status(&StallError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(stall_error_to_status(&StallError::Forbidden), StatusCode::FORBIDDEN);
    assert_eq!(stall_error_to_status(&StallError::Invalid("x")), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        stall_error_to_status(&StallError::Database(sqlx::Error::RowNotFound)),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn get_stall_returns_public_profile() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;

    let Json(profile) = get_stall(State(state), Path(stall_id)).await.unwrap();
    assert_eq!(profile.id, stall_id);
    assert!(profile.is_open);
}

#[tokio::test]
async fn update_stall_rejects_non_owner() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;

    let patch = StallPatch { is_open: Some(false), ..StallPatch::default() };
    let err = update_stall(State(state.clone()), AuthUser::for_tests(Uuid::new_v4()), Path(stall_id), Json(patch))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);
    assert!(state.stalls.read().await[&stall_id].stall.is_open);
}

#[tokio::test]
async fn update_stall_owner_blank_name_is_unprocessable() {
    let state = test_helpers::test_app_state();
    let stall = test_helpers::dummy_stall();
    let owner_id = stall.owner_id;
    let stall_id = test_helpers::seed_stall_with(&state, stall, Vec::new()).await;

    let patch = StallPatch { name: Some(" ".into()), ..StallPatch::default() };
    let err = update_stall(State(state), AuthUser::for_tests(owner_id), Path(stall_id), Json(patch))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn qr_returns_storefront_url() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;

    let Json(payload) = qr(State(state), Path(stall_id)).await.unwrap();
    assert_eq!(payload.stall_id, stall_id);
    assert_eq!(payload.url, format!("http://localhost:3000/s/{stall_id}"));
}
