//! Обновления прогресса пакетной озвучки.
//!
//! Оркестратор отправляет их в необязательный канал `mpsc`; если получатель
//! закрыт, обновления молча теряются. Ожидание места в заполненном канале
//! прерывается отменой пакета.

use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

/// Обновление прогресса для отправки клиенту
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// Началась обработка пакета
    Started {
        /// Количество сегментов в пакете
        total: usize,
    },
    /// Синтез речи
    Synthesizing {
        /// Завершено сегментов (успешно или нет)
        completed: usize,
        /// Общее количество сегментов
        total: usize,
    },
    /// Синтез сегмента завершился ошибкой
    SegmentFailed { index: u32 },
    /// Расчет размещения клипов
    Reconciling,
    /// Микширование дорожки
    Mixing,
    /// Обработка завершена
    Finished,
}

/// Асинхронно отправляет обновление прогресса, пока пакет не отменен
pub async fn send_progress(
    sender: &Option<Sender<ProgressUpdate>>,
    update: ProgressUpdate,
    cancel: &CancellationToken,
) {
    if let Some(sender) = sender {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = sender.send(update) => {}
        }
    }
}
