use crate::audioproxy::AudioProxyRegistry;
use crate::emotext::EmotextClient;
use crate::error::UpstreamError;
use crate::models::{Emotion, Music, PageGroup, RecommendationResponse, Track};
use crate::state::AppState;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("recommendation lookup failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("recommendation service returned no track")]
    NoTrack,
}

/// Text pages in, one recommended track out.
///
/// Pages that cannot be analyzed are skipped. Failures of the
/// recommendation service, including an empty result, fail the request.
pub async fn recommend_for_pages(
    state: &AppState,
    pages: &PageGroup,
) -> Result<RecommendationResponse, RecommendError> {
    let samples = collect_emotions(&state.emotext, pages).await;
    let text_emotion = aggregate_emotion(&samples);

    let tracks = state.musicstore.recommend(text_emotion).await.map_err(|e| {
        warn!(pages = %pages.digest(), error = %e, "murecom4reader: murecom error");
        RecommendError::from(e)
    })?;

    let Some(track) = tracks.into_iter().next() else {
        warn!(pages = %pages.digest(), "murecom4reader: murecom returns no track");
        return Err(RecommendError::NoTrack);
    };

    let response = build_response(track, text_emotion, &state.audio_proxies);
    info!(
        pages = %pages.digest(),
        music = %response.music.title,
        text_emotion = %response.text_emotion,
        "murecom4reader: success"
    );

    Ok(response)
}

/// Analyzes every page in prev -> current -> next order, one call at a time.
pub async fn collect_emotions(emotext: &EmotextClient, pages: &PageGroup) -> Vec<Emotion> {
    let mut samples = Vec::with_capacity(pages.len());

    for text in pages.texts() {
        match emotext.analyze(text).await {
            Ok(emotion) => samples.push(emotion),
            Err(e) => {
                error!(error = %e, "murecom4reader: emotext error, skipping page");
            }
        }
    }

    samples
}

/// Mean valence and arousal. With no samples the neutral emotion stands in
/// as the only sample, so the divisor is never zero.
pub fn aggregate_emotion(samples: &[Emotion]) -> Emotion {
    let samples = if samples.is_empty() {
        std::slice::from_ref(&Emotion::NEUTRAL)
    } else {
        samples
    };

    let (valence, arousal) = samples.iter().fold((0.0, 0.0), |(valence, arousal), e| {
        (valence + e.valence, arousal + e.arousal)
    });
    let count = samples.len() as f64;

    Emotion {
        valence: valence / count,
        arousal: arousal / count,
    }
}

/// Maps the top track into the reader's shape. The audio URL is rewritten to
/// its `/audioproxy/...` path when a registered store serves it.
pub fn build_response(
    track: Track,
    text_emotion: Emotion,
    proxies: &AudioProxyRegistry,
) -> RecommendationResponse {
    let (source_url, _) = proxies.hijack(&track.audio_file_url);

    RecommendationResponse {
        music: Music {
            title: track.name,
            artist: track.artist,
            cover_image: track.cover_image_url,
            source_url,
            track_emotion: track.emotion,
        },
        text_emotion,
    }
}
