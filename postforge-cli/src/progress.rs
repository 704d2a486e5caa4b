use postforge_llm::{ChatPrompt, GeneratorError, PostGenerator, RequestContext};
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

const SPINNER_FRAMES: &[&str] = &["|", "/", "-", "\\"];
const FRAME_INTERVAL: Duration = Duration::from_millis(200);

/// Shows a spinner on stderr while the wrapped backend is waiting on a reply.
pub struct Spinner<G> {
    inner: G,
}

impl<G> Spinner<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

impl<G: PostGenerator> PostGenerator for Spinner<G> {
    fn complete(&self, ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError> {
        let label = prompt.operation.as_str();

        thread::scope(|scope| {
            let spawned = thread::Builder::new()
                .name("postforge-request".into())
                .spawn_scoped(scope, || self.inner.complete(ctx, prompt));
            let handle = match spawned {
                Ok(handle) => handle,
                Err(_) => return self.inner.complete(ctx, prompt),
            };

            let mut frame_index = 0;
            let start = Instant::now();

            while !handle.is_finished() {
                eprint!("\r{label} {}", SPINNER_FRAMES[frame_index]);
                let _ = io::stderr().flush();
                frame_index = (frame_index + 1) % SPINNER_FRAMES.len();
                thread::sleep(FRAME_INTERVAL);
            }

            match handle.join() {
                Ok(result) => {
                    eprintln!(
                        "\r{label} ... finished in {:.1}s",
                        start.elapsed().as_secs_f32()
                    );
                    result
                }
                Err(panic) => {
                    eprintln!("\r{label} ... failed: worker panicked");
                    std::panic::resume_unwind(panic)
                }
            }
        })
    }
}
