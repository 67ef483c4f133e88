//! Wire types for the watcher collect stream
//!
//! Hand-maintained Rust definitions of the protobuf messages exchanged with
//! the k8s watcher, plus the tonic client/server glue for the
//! `relay.v1.MetadataCollector` service.
//!
//! The build script can regenerate this code from proto/relay/v1/relay.proto
//! when protoc is available; these definitions are the committed fallback.

pub mod relay {
    pub mod v1 {
        use prost::Message;

        /// A single watch event from the k8s watcher.
        ///
        /// Exactly one of the body fields is populated, matched to `type`.
        #[derive(Clone, PartialEq, Message)]
        pub struct Info {
            #[prost(int32, tag = "1")]
            pub r#type: i32,
            #[prost(int32, tag = "2")]
            pub event: i32,
            #[prost(message, optional, tag = "3")]
            pub pod_info: Option<PodInfo>,
            #[prost(message, optional, tag = "4")]
            pub rs_info: Option<ReplicaSetInfo>,
            #[prost(message, optional, tag = "5")]
            pub job_info: Option<JobInfo>,
        }

        /// Object kind carried by an `Info` message.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[repr(i32)]
        pub enum InfoType {
            #[default]
            K8sPod = 0,
            K8sReplicaSet = 1,
            K8sJob = 2,
        }

        impl InfoType {
            pub fn from_i32(value: i32) -> Option<InfoType> {
                match value {
                    0 => Some(InfoType::K8sPod),
                    1 => Some(InfoType::K8sReplicaSet),
                    2 => Some(InfoType::K8sJob),
                    _ => None,
                }
            }

            pub fn as_str_name(&self) -> &'static str {
                match self {
                    InfoType::K8sPod => "K8S_POD",
                    InfoType::K8sReplicaSet => "K8S_REPLICASET",
                    InfoType::K8sJob => "K8S_JOB",
                }
            }
        }

        /// Watch event type, mirroring the Kubernetes watch API.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[repr(i32)]
        pub enum InfoEvent {
            #[default]
            Added = 0,
            Modified = 1,
            Deleted = 2,
            Error = 3,
        }

        impl InfoEvent {
            pub fn from_i32(value: i32) -> Option<InfoEvent> {
                match value {
                    0 => Some(InfoEvent::Added),
                    1 => Some(InfoEvent::Modified),
                    2 => Some(InfoEvent::Deleted),
                    3 => Some(InfoEvent::Error),
                    _ => None,
                }
            }

            pub fn as_str_name(&self) -> &'static str {
                match self {
                    InfoEvent::Added => "ADDED",
                    InfoEvent::Modified => "MODIFIED",
                    InfoEvent::Deleted => "DELETED",
                    InfoEvent::Error => "ERROR",
                }
            }
        }

        /// Controller reference: an object's direct controller, or the
        /// parent recorded behind a ReplicaSet/Job.
        #[derive(Clone, PartialEq, Message)]
        pub struct OwnerInfo {
            #[prost(string, tag = "1")]
            pub uid: String,
            #[prost(string, tag = "2")]
            pub name: String,
            #[prost(string, tag = "3")]
            pub kind: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct ContainerInfo {
            #[prost(string, tag = "1")]
            pub id: String,
            #[prost(string, tag = "2")]
            pub name: String,
            #[prost(string, tag = "3")]
            pub image: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct PodInfo {
            #[prost(string, tag = "1")]
            pub uid: String,
            /// Dotted IPv4 address; empty while the pod is starting up.
            #[prost(string, tag = "2")]
            pub ip: String,
            #[prost(string, tag = "3")]
            pub name: String,
            #[prost(string, tag = "4")]
            pub ns: String,
            #[prost(string, tag = "5")]
            pub version: String,
            #[prost(bool, tag = "6")]
            pub is_host_network: bool,
            #[prost(message, optional, tag = "7")]
            pub owner: Option<OwnerInfo>,
            #[prost(message, repeated, tag = "8")]
            pub container_infos: Vec<ContainerInfo>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct ReplicaSetInfo {
            #[prost(string, tag = "1")]
            pub uid: String,
            #[prost(message, optional, tag = "2")]
            pub owner: Option<OwnerInfo>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct JobInfo {
            #[prost(string, tag = "1")]
            pub uid: String,
            #[prost(message, optional, tag = "2")]
            pub owner: Option<OwnerInfo>,
        }

        /// Response sent to the watcher. Only ever written as the final
        /// "stop and re-list" notification before the relay cancels the
        /// stream.
        #[derive(Clone, PartialEq, Message)]
        pub struct CollectResponse {}

        /// Generated client implementations.
        pub mod metadata_collector_client {
            use super::*;
            use tonic::codegen::*;
            use tonic::transport::Uri;

            /// Client for the metadata relay collect stream.
            #[derive(Debug, Clone)]
            pub struct MetadataCollectorClient<T> {
                inner: tonic::client::Grpc<T>,
            }

            impl MetadataCollectorClient<tonic::transport::Channel> {
                pub fn new(channel: tonic::transport::Channel) -> Self {
                    let inner = tonic::client::Grpc::new(channel);
                    Self { inner }
                }
            }

            impl<T> MetadataCollectorClient<T>
            where
                T: tonic::client::GrpcService<tonic::body::BoxBody>,
                T::Error: Into<StdError>,
                T::ResponseBody: Body<Data = Bytes> + Send + 'static,
                <T::ResponseBody as Body>::Error: Into<StdError> + Send,
            {
                pub fn with_origin(inner: T, origin: Uri) -> Self {
                    let inner = tonic::client::Grpc::with_origin(inner, origin);
                    Self { inner }
                }

                /// Open the bidirectional collect stream.
                pub async fn collect(
                    &mut self,
                    request: impl tonic::IntoStreamingRequest<Message = Info>,
                ) -> std::result::Result<
                    tonic::Response<tonic::codec::Streaming<CollectResponse>>,
                    tonic::Status,
                > {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/relay.v1.MetadataCollector/Collect",
                    );
                    self.inner
                        .streaming(request.into_streaming_request(), path, codec)
                        .await
                }
            }
        }

        /// Generated server implementations.
        pub mod metadata_collector_server {
            use super::*;
            use tonic::codegen::*;

            /// Service trait implemented by the relay; one `collect` call
            /// per watcher session.
            #[async_trait]
            pub trait MetadataCollector: Send + Sync + 'static {
                /// Server streaming response type for the Collect method.
                type CollectStream: tonic::codegen::tokio_stream::Stream<
                        Item = std::result::Result<CollectResponse, tonic::Status>,
                    > + Send
                    + 'static;

                async fn collect(
                    &self,
                    request: tonic::Request<tonic::Streaming<Info>>,
                ) -> std::result::Result<tonic::Response<Self::CollectStream>, tonic::Status>;
            }

            #[derive(Debug)]
            pub struct MetadataCollectorServer<T> {
                inner: Arc<T>,
            }

            impl<T> MetadataCollectorServer<T> {
                pub fn new(inner: T) -> Self {
                    Self::from_arc(Arc::new(inner))
                }

                pub fn from_arc(inner: Arc<T>) -> Self {
                    Self { inner }
                }
            }

            impl<T, B> tonic::codegen::Service<http::Request<B>> for MetadataCollectorServer<T>
            where
                T: MetadataCollector,
                B: Body + Send + 'static,
                B::Error: Into<StdError> + Send + 'static,
            {
                type Response = http::Response<tonic::body::BoxBody>;
                type Error = std::convert::Infallible;
                type Future = BoxFuture<Self::Response, Self::Error>;

                fn poll_ready(
                    &mut self,
                    _cx: &mut Context<'_>,
                ) -> Poll<std::result::Result<(), Self::Error>> {
                    Poll::Ready(Ok(()))
                }

                fn call(&mut self, req: http::Request<B>) -> Self::Future {
                    match req.uri().path() {
                        "/relay.v1.MetadataCollector/Collect" => {
                            #[allow(non_camel_case_types)]
                            struct CollectSvc<T: MetadataCollector>(pub Arc<T>);
                            impl<T: MetadataCollector> tonic::server::StreamingService<Info>
                                for CollectSvc<T>
                            {
                                type Response = CollectResponse;
                                type ResponseStream = T::CollectStream;
                                type Future =
                                    BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;

                                fn call(
                                    &mut self,
                                    request: tonic::Request<tonic::Streaming<Info>>,
                                ) -> Self::Future {
                                    let inner = Arc::clone(&self.0);
                                    let fut = async move {
                                        <T as MetadataCollector>::collect(&inner, request).await
                                    };
                                    Box::pin(fut)
                                }
                            }
                            let inner = self.inner.clone();
                            let fut = async move {
                                let method = CollectSvc(inner);
                                let codec = tonic::codec::ProstCodec::default();
                                let mut grpc = tonic::server::Grpc::new(codec);
                                let res = grpc.streaming(method, req).await;
                                Ok(res)
                            };
                            Box::pin(fut)
                        }
                        _ => Box::pin(async move {
                            Ok(http::Response::builder()
                                .status(200)
                                .header("grpc-status", tonic::Code::Unimplemented as i32)
                                .header(
                                    http::header::CONTENT_TYPE,
                                    tonic::metadata::GRPC_CONTENT_TYPE,
                                )
                                .body(empty_body())
                                .unwrap())
                        }),
                    }
                }
            }

            impl<T> Clone for MetadataCollectorServer<T> {
                fn clone(&self) -> Self {
                    Self {
                        inner: self.inner.clone(),
                    }
                }
            }

            pub const SERVICE_NAME: &str = "relay.v1.MetadataCollector";

            impl<T> tonic::server::NamedService for MetadataCollectorServer<T> {
                const NAME: &'static str = SERVICE_NAME;
            }
        }
    }
}

pub use relay::v1::metadata_collector_client::MetadataCollectorClient;
pub use relay::v1::metadata_collector_server::{MetadataCollector, MetadataCollectorServer};
pub use relay::v1::*;
