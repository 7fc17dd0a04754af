//! Analyses run through `run_checks`: cache preparation, ambiguity,
//! duplicates and audio consistency

mod helpers;

use deckdata_common::{ConflictSide, Error};
use deckdata_sync::services::ambiguity::{HintKind, TextSide};
use deckdata_sync::services::audio_consistency::AudioOwner;
use deckdata_sync::services::check::CachePreparation;
use deckdata_sync::services::{
    export, import, run_checks, CheckReport, ConflictResolution, Outcome, SyncOptions,
};
use deckdata_sync::SyncContext;
use helpers::*;
use std::fs;
use tempfile::TempDir;

async fn checks(ctx: &SyncContext, options: &SyncOptions, auto_fix: bool) -> CheckReport {
    run_checks(ctx, options, auto_fix)
        .await
        .unwrap()
        .done()
        .expect("checks were skipped")
}

async fn edit_cache(ctx: &SyncContext) {
    let pool = ctx.open_existing_cache().await.unwrap();
    sqlx::query("UPDATE vocabulary SET clarification = 'a feline' WHERE key = 'the cat'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
}

#[tokio::test]
async fn test_bank_homonyms_need_a_pronunciation_hint() {
    let root = TempDir::new().unwrap();
    let ctx = canonical_context(&root);

    let report = checks(&ctx, &SyncOptions::default(), false).await;
    assert_eq!(report.cache, CachePreparation::Imported);
    assert!(report.audio.is_none());
    assert!(report.duplicates.is_clean());

    assert_eq!(report.ambiguities.pairs.len(), 1);
    let pair = &report.ambiguities.pairs[0];
    assert_eq!(pair.file, PAIR_EN_DE);
    assert_eq!(pair.ambiguities.len(), 1);
    let ambiguity = &pair.ambiguities[0];
    assert_eq!(ambiguity.text, "bank");
    assert_eq!(ambiguity.side, TextSide::Source);
    assert_eq!(ambiguity.keys, vec!["bank (money)", "bank (river)"]);
    assert_eq!(ambiguity.missing, vec![HintKind::Pronunciation]);
    assert!(report.to_string().contains("missing pronunciation hint"));

    // A hint on one member is enough
    write_file(
        &ctx.settings.data_dir,
        PAIR_EN_DE,
        "key,guid,pronunciation hint,spelling hint,reading hint,listening hint,notes\n\
         bank (money),Abc123,money,,,,\n\
         bank (river),Xyz789,,,,,\n\
         the cat,Q1w2e3,,,,,\n",
    );

    let report = checks(&ctx, &SyncOptions::default(), false).await;
    assert_eq!(report.cache, CachePreparation::Reimported);
    assert!(report.ambiguities.is_clean());
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_duplicates_are_reported_from_csv() {
    let root = TempDir::new().unwrap();
    let ctx = canonical_context(&root);
    write_file(
        &ctx.settings.data_dir,
        PICTURES,
        "key,picture,picture source\nthe cat,a.jpg,\nbank (river),r.jpg,\nthe cat,b.jpg,\n",
    );

    let summary = import(&ctx, &ctx.settings.data_dir, &SyncOptions::default())
        .await
        .unwrap()
        .done()
        .unwrap();
    assert_eq!(summary.collapsed_duplicates, 1);

    let report = checks(&ctx, &SyncOptions::default(), false).await;
    assert_eq!(report.cache, CachePreparation::UpToDate);
    assert_eq!(report.duplicates.files.len(), 1);
    let file = &report.duplicates.files[0];
    assert_eq!(file.file, PICTURES);
    assert_eq!(file.duplicates[0].identity, vec!["the cat"]);
    assert_eq!(file.duplicates[0].count, 2);
}

#[tokio::test]
async fn test_audio_consistency_and_auto_fix() {
    let root = TempDir::new().unwrap();
    let ctx = canonical_context(&root);
    let media = ctx.settings.media_dir.clone();
    write_file(&media, "de_DE/de_bank.mp3", "audio");
    write_file(&media, "de_DE/bahn.mp3", "audio");
    write_file(&media, "en_US/orphan.ogg", "audio");
    write_file(&media, "en_US/notes.txt", "not audio");
    write_file(&media, "misc/stray.mp3", "not a locale directory");

    let report = checks(&ctx, &SyncOptions::default(), false).await;
    let audio = report.audio.expect("media directory exists");

    assert_eq!(audio.missing.len(), 1);
    assert_eq!(
        audio.missing[0].owner,
        AudioOwner::BaseLanguage {
            locale: "en_us".parse().unwrap(),
            key: "bank (money)".to_string(),
        }
    );
    assert_eq!(audio.missing[0].pointer.file_name(), "en_bank.mp3");
    assert_eq!(audio.orphaned.len(), 1);
    assert_eq!(audio.orphaned[0].file_name, "orphan.ogg");
    assert!(audio.fixes.is_empty());
    let text = audio.to_string();
    assert!(text.contains("AUDIO FILES IN DATABASE BUT NOT ON DISK"));
    assert!(text.contains("AUDIO FILES ON DISK BUT NOT IN DATABASE"));
    assert!(text.contains("en_US/orphan.ogg"));

    // Auto-fix: each item fixed and reported
    let report = checks(&ctx, &SyncOptions::default(), true).await;
    let audio = report.audio.unwrap();
    assert_eq!(audio.fixes.len(), 2);
    assert!(audio.fixes.iter().all(|f| f.succeeded()));
    let text = audio.to_string();
    assert!(text.contains("Cleared audio for 'bank (money)'"));
    assert!(text.contains("Deleted en_US/orphan.ogg"));
    assert!(!file_path(&media, "en_US/orphan.ogg").exists());
    assert!(file_path(&media, "misc/stray.mp3").exists());

    // Consistent now; the fix is an unsynced cache write
    let report = checks(&ctx, &SyncOptions::default(), false).await;
    assert!(report.audio.unwrap().is_consistent());
    assert!(report.freshness.unwrap().unsynced_cache_writes > 0);

    // Exporting carries the cleared pointer back to the CSV
    let data_dir = ctx.settings.data_dir.clone();
    export(&ctx, &data_dir, &SyncOptions::strict()).await.unwrap();
    assert!(read_file(&data_dir, BASE_EN).contains("bank (money),bank,/bæŋk/,,,AnkiLangs::EN\n"));
}

#[tokio::test]
async fn test_auto_fix_clears_padded_pointer() {
    let root = TempDir::new().unwrap();
    let ctx = test_context(&root);
    write_file(
        &ctx.settings.data_dir,
        BASE_EN,
        "key,text:en,ipa:en,audio:en,audio source:en,tags:en\n\
         the cat,the cat,,[sound:cat.mp3] ,,AnkiLangs::EN\n",
    );
    fs::create_dir_all(file_path(&ctx.settings.media_dir, "en_US")).unwrap();

    let report = checks(&ctx, &SyncOptions::default(), true).await;
    let audio = report.audio.unwrap();
    assert_eq!(audio.missing.len(), 1);
    assert_eq!(audio.missing[0].pointer.file_name(), "cat.mp3");
    assert_eq!(audio.missing[0].stored, "[sound:cat.mp3] ");
    assert_eq!(audio.fixes.len(), 1);
    assert!(audio.fixes[0].succeeded());

    let pool = ctx.open_existing_cache().await.unwrap();
    let stored: Option<String> =
        sqlx::query_scalar("SELECT audio FROM base_language WHERE key = 'the cat'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stored, None);
    pool.close().await;

    let report = checks(&ctx, &SyncOptions::default(), false).await;
    assert!(report.audio.unwrap().is_consistent());
}

#[tokio::test]
async fn test_stale_cache_resolution() {
    let root = TempDir::new().unwrap();
    let ctx = canonical_context(&root);
    import(&ctx, &ctx.settings.data_dir, &SyncOptions::default())
        .await
        .unwrap();
    edit_cache(&ctx).await;
    write_file(
        &ctx.settings.data_dir,
        UI_STRINGS,
        "locale,key,value\nen_us,deck_title,625 Words\n",
    );

    let outcome = run_checks(&ctx, &SyncOptions::default(), false).await.unwrap();
    assert!(matches!(outcome, Outcome::Skipped(ref c) if c.side == ConflictSide::Cache));

    match run_checks(&ctx, &SyncOptions::strict(), false).await {
        Err(Error::SyncConflict { side, .. }) => assert_eq!(side, ConflictSide::Cache),
        other => panic!("expected sync conflict, got {:?}", other),
    }

    // Ignore analyses the cache as it is
    let report = checks(&ctx, &SyncOptions::resolving(ConflictResolution::Ignore), false).await;
    assert_eq!(report.cache, CachePreparation::Stale);
    let freshness = report.freshness.unwrap();
    assert_eq!(freshness.changed_files.len(), 1);
    assert_eq!(freshness.changed_files[0].name, UI_STRINGS);

    // Overwrite re-imports and drops the cache edit
    let report = checks(&ctx, &SyncOptions::resolving(ConflictResolution::Overwrite), false).await;
    assert_eq!(report.cache, CachePreparation::Reimported);

    let pool = ctx.open_existing_cache().await.unwrap();
    let clarification: Option<String> =
        sqlx::query_scalar("SELECT clarification FROM vocabulary WHERE key = 'the cat'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(clarification, None);
    pool.close().await;
}

#[tokio::test]
async fn test_missing_data_dir_creates_no_cache() {
    let root = TempDir::new().unwrap();
    let ctx = test_context(&root);

    let result = run_checks(&ctx, &SyncOptions::default(), false).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(!ctx.settings.cache_path.exists());
}
