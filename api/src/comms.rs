use std::fmt;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};

use msgs::Message;
use utils::time;

/// A façade request on its way to the engine, with the "contact details"
/// the response should be matched back through.
pub struct Envelope {
    pub message: Message,
    pub response_tx: Option<mpsc::Sender<Result<Message, String>>>,
    pub response_filter: Option<Box<dyn Send + Fn(&Message) -> bool>>,
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope").field("message", &self.message).finish()
    }
}

pub struct CommsActor;

type FilterFn = Box<dyn Send + Fn(&Message) -> bool>;
type ContactDetails = (mpsc::Sender<Result<Message, String>>, FilterFn, u64);

const FILTER_EXPIRATION_MILLIS: u64 = 30_000;
const FILTER_SIZE_LIMIT: usize = 1000;

impl CommsActor {
    pub async fn start(
        mut rx: mpsc::Receiver<Envelope>,
        mut subscriber: broadcast::Receiver<Message>,
        engine_tx: mpsc::Sender<Message>,
    ) {
        let waiting: Arc<Mutex<Vec<ContactDetails>>> =
            Arc::new(Mutex::new(Vec::with_capacity(FILTER_SIZE_LIMIT)));

        let reader_task = {
            let waiting = waiting.clone();

            async move {
                while let Ok(message) = subscriber.recv().await {
                    let mut guard = waiting.lock().await;
                    let mut i = 0;
                    while i < guard.len() {
                        if (guard[i].1)(&message) {
                            let (tx, _, _) = guard.swap_remove(i);
                            let response = Ok(message.clone());
                            tokio::spawn(async move {
                                let _ = tx.send(response).await;
                            });
                        } else {
                            i += 1;
                        }
                    }

                    // garbage-collect stale waiters only when the list is big
                    if guard.len() > FILTER_SIZE_LIMIT {
                        let now = time::time_now();
                        guard.retain(|(_, _, created)| now <= created + FILTER_EXPIRATION_MILLIS);
                    }
                }
            }
        };

        tokio::spawn(reader_task);

        while let Some(Envelope {
            message,
            response_tx,
            response_filter,
        }) = rx.recv().await
        {
            if let (Some(tx), Some(filter)) = (response_tx, response_filter) {
                waiting.lock().await.push((tx, filter, time::time_now()));
            }

            if engine_tx.send(message).await.is_err() {
                return;
            }
        }
    }
}
