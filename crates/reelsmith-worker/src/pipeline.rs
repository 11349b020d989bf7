//! Compose-and-upload entry points.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::Instrument;

use reelsmith_media::Composer;
use reelsmith_models::{
    CaptionSource, CompositionRequest, CompositionResult, CompositionStage, ErrorKind,
};
use reelsmith_speech::{synthesize_to_file, AlignmentProvider};
use reelsmith_storage::{composition_key, MediaUploader, VIDEO_MP4};

use crate::admission::AdmissionControl;
use crate::logging::CompositionLogger;
use crate::metrics::record_composition;

/// Compose locally, then publish the render.
///
/// An upload failure does not fail the request: the local render stays in
/// place and the error is attached so the caller can retry only the upload.
pub async fn compose_and_upload(
    composer: &Composer,
    uploader: &dyn MediaUploader,
    request: &CompositionRequest,
) -> CompositionResult {
    let result = composer.compose(request).await;
    if !result.success {
        return result;
    }
    let Some(output) = result.output_path.clone() else {
        return result;
    };

    let logger = CompositionLogger::new(request);
    let key = composition_key(request, Utc::now());
    logger.log_stage(CompositionStage::Upload, &format!("uploading to {}", key));

    match uploader.upload_media(&output, &key, VIDEO_MP4).await {
        Ok(info) => {
            logger.log_stage(CompositionStage::Upload, &format!("uploaded {}", info.url));
            result.with_upload(info)
        }
        Err(e) => {
            logger.log_warning(&format!("upload of {} failed: {}", key, e));
            result.with_upload_error(e.to_string())
        }
    }
}

/// Everything a worker needs to serve composition requests.
#[derive(Clone)]
pub struct CompositionService {
    composer: Composer,
    admission: AdmissionControl,
    uploader: Option<Arc<dyn MediaUploader>>,
    speech: Option<Arc<dyn AlignmentProvider>>,
}

impl CompositionService {
    pub fn new(composer: Composer, admission: AdmissionControl) -> Self {
        Self {
            composer,
            admission,
            uploader: None,
            speech: None,
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn MediaUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn AlignmentProvider>) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Serve one request: admission, optional narration, compose, upload.
    pub async fn handle(&self, request: CompositionRequest) -> CompositionResult {
        let logger = CompositionLogger::new(&request);
        let span = logger.create_span();

        async {
            let started = Instant::now();
            logger.log_start(&format!(
                "background={} voice={}",
                request.background_video.display(),
                request.voice_audio.display()
            ));

            let _permit = match self.admission.acquire(&request.project_id).await {
                Ok(permit) => permit,
                Err(e) => {
                    return CompositionResult::failed(
                        &request,
                        CompositionStage::ValidateInputs,
                        ErrorKind::Internal,
                        format!("admission closed: {}", e),
                    )
                }
            };

            let request = match self.synthesize_narration(request, &logger).await {
                Ok(request) => request,
                Err(failed) => {
                    logger.log_result(&failed);
                    record_composition(&failed, started.elapsed().as_secs_f64());
                    return *failed;
                }
            };

            let result = match &self.uploader {
                Some(uploader) => compose_and_upload(&self.composer, uploader.as_ref(), &request).await,
                None => self.composer.compose(&request).await,
            };
            logger.log_result(&result);
            record_composition(&result, started.elapsed().as_secs_f64());
            result
        }
        .instrument(span)
        .await
    }

    /// Write the voice track from the narration block, if any.
    ///
    /// The returned alignment becomes the caption source when the request
    /// names none.
    async fn synthesize_narration(
        &self,
        mut request: CompositionRequest,
        logger: &CompositionLogger,
    ) -> Result<CompositionRequest, Box<CompositionResult>> {
        let Some(narration) = request.narration.clone() else {
            return Ok(request);
        };

        let stage = CompositionStage::SynthesizeVoice;
        let Some(speech) = &self.speech else {
            return Err(Box::new(CompositionResult::failed(
                &request,
                stage,
                ErrorKind::Speech,
                "request has narration but no speech provider is configured",
            )));
        };

        logger.log_stage(stage, &format!("synthesizing with voice {}", narration.voice_id));
        match synthesize_to_file(
            speech.as_ref(),
            &narration.text,
            &narration.voice_id,
            &request.voice_audio,
        )
        .await
        {
            Ok(alignment) => {
                if request.captions.is_none() {
                    request.captions = CaptionSource::Alignment { alignment };
                }
                Ok(request)
            }
            Err(e) => Err(Box::new(CompositionResult::failed(
                &request,
                stage,
                e.kind(),
                e.to_string(),
            ))),
        }
    }
}
