use std::sync::Arc;

use reqwest::{Request, Response};

use super::{Exchange, RequestInterceptor, ResponseInterceptor};
use crate::Result;

/// Snapshot of the interceptors of one kind, taken when a request starts
#[derive(Debug)]
pub(crate) struct Chain<I: ?Sized>(Vec<Arc<I>>);

pub(crate) type RequestChain = Chain<dyn RequestInterceptor>;
pub(crate) type ResponseChain = Chain<dyn ResponseInterceptor>;

impl<I: ?Sized> Chain<I> {
    pub(crate) const fn new(values: Vec<Arc<I>>) -> Self {
        Self(values)
    }
}

impl Chain<dyn RequestInterceptor> {
    /// Passes `request` through every interceptor, stopping at the first error
    pub(crate) async fn traverse(
        &self,
        mut request: Request,
        exchange: &mut Exchange,
    ) -> Result<Request> {
        for interceptor in &self.0 {
            request = interceptor.on_request(request, exchange).await?;
        }
        Ok(request)
    }
}

impl Chain<dyn ResponseInterceptor> {
    /// Passes the outcome through every interceptor. An interceptor turning a
    /// response into an error sends the remaining ones down the failure branch.
    pub(crate) async fn traverse(
        &self,
        mut outcome: Result<Response>,
        exchange: &mut Exchange,
    ) -> Result<Response> {
        for interceptor in &self.0 {
            outcome = match outcome {
                Ok(response) => interceptor.on_response(response, exchange).await,
                Err(error) => Err(interceptor.on_error(error, exchange).await),
            };
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use async_trait::async_trait;
    use http::StatusCode;
    use reqwest::Method;
    use std::sync::Mutex;
    use url::Url;

    #[derive(Debug)]
    struct AddHeader(&'static str);

    #[async_trait]
    impl RequestInterceptor for AddHeader {
        async fn on_request(&self, mut request: Request, _: &mut Exchange) -> Result<Request> {
            request
                .headers_mut()
                .append("x-chain", self.0.parse().unwrap());
            Ok(request)
        }
    }

    #[derive(Debug)]
    struct Reject;

    #[async_trait]
    impl RequestInterceptor for Reject {
        async fn on_request(&self, _: Request, _: &mut Exchange) -> Result<Request> {
            Err(ErrorKind::GateClosed)
        }
    }

    /// Records which branch it was called on, and fails every response
    /// with a 418 when `fail` is set
    #[derive(Debug, Default)]
    struct Record {
        calls: Mutex<Vec<&'static str>>,
        fail: bool,
    }

    #[async_trait]
    impl ResponseInterceptor for Record {
        async fn on_response(&self, response: Response, _: &mut Exchange) -> Result<Response> {
            self.calls.lock().unwrap().push("response");
            if self.fail {
                return Err(ErrorKind::RejectedStatusCode {
                    status: StatusCode::IM_A_TEAPOT,
                    url: Url::parse("http://localhost/").unwrap(),
                });
            }
            Ok(response)
        }

        async fn on_error(&self, error: ErrorKind, _: &mut Exchange) -> ErrorKind {
            self.calls.lock().unwrap().push("error");
            error
        }
    }

    fn exchange() -> (Request, Exchange) {
        let url = Url::parse("http://localhost/").unwrap();
        (
            Request::new(Method::GET, url.clone()),
            Exchange::new(Method::GET, url),
        )
    }

    fn ok_response() -> Response {
        Response::from(http::Response::new(""))
    }

    #[tokio::test]
    async fn simple_chain() {
        let interceptors: Vec<Arc<dyn RequestInterceptor>> =
            vec![Arc::new(AddHeader("a")), Arc::new(AddHeader("b"))];
        let chain = RequestChain::new(interceptors);
        let (request, mut exchange) = exchange();

        let request = chain.traverse(request, &mut exchange).await.unwrap();
        let values: Vec<_> = request.headers().get_all("x-chain").iter().collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn early_exit_chain() {
        let interceptors: Vec<Arc<dyn RequestInterceptor>> =
            vec![Arc::new(Reject), Arc::new(AddHeader("never"))];
        let chain = RequestChain::new(interceptors);
        let (request, mut exchange) = exchange();

        let error = chain.traverse(request, &mut exchange).await.unwrap_err();
        assert!(matches!(error, ErrorKind::GateClosed));
    }

    #[tokio::test]
    async fn response_turned_into_error() {
        let failing = Arc::new(Record {
            fail: true,
            ..Record::default()
        });
        let after = Arc::new(Record::default());
        let interceptors: Vec<Arc<dyn ResponseInterceptor>> = vec![
            Arc::clone(&failing) as Arc<dyn ResponseInterceptor>,
            Arc::clone(&after) as Arc<dyn ResponseInterceptor>,
        ];
        let chain = ResponseChain::new(interceptors);
        let (_, mut exchange) = exchange();

        let error = chain
            .traverse(Ok(ok_response()), &mut exchange)
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(StatusCode::IM_A_TEAPOT));
        assert_eq!(*failing.calls.lock().unwrap(), vec!["response"]);
        assert_eq!(*after.calls.lock().unwrap(), vec!["error"]);
    }
}
